//! In-memory document store.
//!
//! One `RwLock` per collection. Reads of banks and questions go through the
//! live-only accessors here, so soft-deleted documents never leak into a
//! handler that forgot to filter them. Bank writes replace the whole document.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    Attempt, AttemptStatus, BankAction, BankActivity, BookTemplate, Homework, Question, QuestionBank,
    QuestionType, Quiz,
};
use crate::error::{AppError, AppResult};

/// Predicate over live questions of one bank.
#[derive(Debug, Clone, Copy)]
pub struct QuestionFilter<'a> {
    pub bank: Uuid,
    pub node_ids: Option<&'a [String]>,
    pub kind: Option<QuestionType>,
    pub code: Option<&'a str>,
}

impl<'a> QuestionFilter<'a> {
    pub fn bank(bank: Uuid) -> Self {
        Self { bank, node_ids: None, kind: None, code: None }
    }

    fn matches(&self, q: &Question) -> bool {
        !q.is_deleted
            && q.bank == self.bank
            && self.kind.map_or(true, |k| q.question_type == k)
            && self.code.map_or(true, |c| q.code == c)
            && self.node_ids.map_or(true, |ids| {
                q.structure_node_id.as_ref().is_some_and(|n| ids.contains(n))
            })
    }
}

#[derive(Default)]
struct Attempts {
    by_id: HashMap<Uuid, Attempt>,
    /// Unique index: (quiz, user) -> the in-progress attempt.
    open: HashMap<(Uuid, Uuid), Uuid>,
}

#[derive(Default)]
pub struct Store {
    banks: RwLock<HashMap<Uuid, QuestionBank>>,
    /// Insertion order is the natural order used by unshuffled quizzes.
    questions: RwLock<Vec<Question>>,
    quizzes: RwLock<HashMap<Uuid, Quiz>>,
    attempts: RwLock<Attempts>,
    homeworks: RwLock<HashMap<Uuid, Homework>>,
    books: RwLock<HashMap<String, BookTemplate>>,
    activity: RwLock<Vec<BankActivity>>,
}

impl Store {
    pub fn with_books(books: impl IntoIterator<Item = BookTemplate>) -> Self {
        let books = books.into_iter().map(|b| (b.book_id.clone(), b)).collect();
        Self { books: RwLock::new(books), ..Default::default() }
    }

    // ---------- banks ----------

    pub async fn insert_bank(&self, bank: QuestionBank) {
        self.banks.write().await.insert(bank.id, bank);
    }

    /// Live bank by id.
    pub async fn bank(&self, id: Uuid) -> AppResult<QuestionBank> {
        self.banks
            .read()
            .await
            .get(&id)
            .filter(|b| !b.is_deleted)
            .cloned()
            .ok_or(AppError::NotFound("question bank"))
    }

    /// Live banks the user owns or belongs to, newest first.
    pub async fn banks_for(&self, user: Uuid) -> Vec<QuestionBank> {
        let mut out: Vec<QuestionBank> = self
            .banks
            .read()
            .await
            .values()
            .filter(|b| !b.is_deleted && b.role_of(user).is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Load the live bank, apply `f` to a copy, and write the copy back only if `f` succeeds.
    #[instrument(level = "debug", skip(self, f), fields(%id))]
    pub async fn update_bank<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut QuestionBank) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut banks = self.banks.write().await;
        let stored = banks
            .get_mut(&id)
            .filter(|b| !b.is_deleted)
            .ok_or(AppError::NotFound("question bank"))?;
        let mut draft = stored.clone();
        let out = f(&mut draft)?;
        draft.updated_at = Utc::now();
        *stored = draft;
        Ok(out)
    }

    /// Best-effort counter bump, separate from the question insert.
    pub async fn bump_question_count(&self, id: Uuid, by: usize) {
        if let Some(b) = self.banks.write().await.get_mut(&id) {
            b.question_count += by as u64;
        }
    }

    // ---------- questions ----------

    /// Unordered insert: documents whose `(bank, code)` is already taken are
    /// skipped and the rest go in. Returns how many were inserted.
    #[instrument(level = "debug", skip(self, docs), fields(batch = docs.len()))]
    pub async fn insert_questions(&self, docs: Vec<Question>) -> usize {
        let mut questions = self.questions.write().await;
        let mut taken: HashSet<(Uuid, String)> =
            questions.iter().map(|q| (q.bank, q.code.clone())).collect();
        let mut inserted = 0;
        for q in docs {
            if !taken.insert((q.bank, q.code.clone())) {
                warn!(target: "quizbank", bank = %q.bank, code = %q.code, "Duplicate question code; skipped");
                continue;
            }
            questions.push(q);
            inserted += 1;
        }
        debug!(target: "quizbank", inserted, "Questions inserted");
        inserted
    }

    /// Live questions matching `filter`, in insertion order.
    pub async fn find_questions(&self, filter: &QuestionFilter<'_>) -> Vec<Question> {
        self.questions
            .read()
            .await
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect()
    }

    pub async fn count_questions(&self, filter: &QuestionFilter<'_>) -> usize {
        self.questions.read().await.iter().filter(|q| filter.matches(q)).count()
    }

    /// Exact live question count for a bank.
    pub async fn count_live_questions(&self, bank: Uuid) -> usize {
        self.count_questions(&QuestionFilter::bank(bank)).await
    }

    /// Questions by id, soft-deleted ones included. Only for grading a quiz snapshot.
    pub async fn question_snapshot(&self, ids: &[Uuid]) -> HashMap<Uuid, Question> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        self.questions
            .read()
            .await
            .iter()
            .filter(|q| wanted.contains(&q.id))
            .map(|q| (q.id, q.clone()))
            .collect()
    }

    pub async fn soft_delete_question(&self, bank: Uuid, id: Uuid) -> AppResult<()> {
        let mut questions = self.questions.write().await;
        let q = questions
            .iter_mut()
            .find(|q| q.id == id && q.bank == bank && !q.is_deleted)
            .ok_or(AppError::NotFound("question"))?;
        q.is_deleted = true;
        Ok(())
    }

    // ---------- quizzes ----------

    pub async fn insert_quiz(&self, quiz: Quiz) {
        self.quizzes.write().await.insert(quiz.id, quiz);
    }

    pub async fn quiz(&self, id: Uuid) -> AppResult<Quiz> {
        self.quizzes.read().await.get(&id).cloned().ok_or(AppError::NotFound("quiz"))
    }

    // ---------- attempts ----------

    /// Return the open attempt for (quiz, user) or create one. Check and insert
    /// happen under one write lock, so concurrent starts share a single attempt.
    pub async fn start_attempt(&self, quiz: Uuid, user: Uuid, total: usize) -> (Attempt, bool) {
        let mut attempts = self.attempts.write().await;
        if let Some(existing) = attempts.open.get(&(quiz, user)).and_then(|id| attempts.by_id.get(id)) {
            return (existing.clone(), true);
        }
        let attempt = Attempt {
            id: Uuid::new_v4(),
            quiz,
            user,
            status: AttemptStatus::InProgress,
            answers: Vec::new(),
            score: 0,
            total,
            started_at: Utc::now(),
            submitted_at: None,
        };
        attempts.open.insert((quiz, user), attempt.id);
        attempts.by_id.insert(attempt.id, attempt.clone());
        (attempt, false)
    }

    pub async fn attempt(&self, id: Uuid) -> AppResult<Attempt> {
        self.attempts.read().await.by_id.get(&id).cloned().ok_or(AppError::NotFound("attempt"))
    }

    /// Apply `f` to a copy of an in-progress attempt and store it. Once the
    /// attempt is submitted it leaves the open index and is never written again.
    pub async fn finalize_attempt(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Attempt) -> AppResult<()>,
    ) -> AppResult<Attempt> {
        let mut attempts = self.attempts.write().await;
        let stored = attempts.by_id.get_mut(&id).ok_or(AppError::NotFound("attempt"))?;
        if stored.status == AttemptStatus::Submitted {
            return Err(AppError::AlreadySubmitted);
        }
        let mut draft = stored.clone();
        f(&mut draft)?;
        *stored = draft.clone();
        if draft.status == AttemptStatus::Submitted {
            attempts.open.remove(&(draft.quiz, draft.user));
        }
        Ok(draft)
    }

    // ---------- homework ----------

    /// Insert `hw` with a share code no other homework holds. `assign` sets the
    /// code (and anything derived from it) for try number `n`; it is called
    /// again until the code is free. Check and insert share one write lock.
    pub async fn insert_homework_with_code(
        &self,
        mut hw: Homework,
        mut assign: impl FnMut(&mut Homework, usize),
    ) -> Homework {
        let mut homeworks = self.homeworks.write().await;
        let mut n = 0;
        loop {
            assign(&mut hw, n);
            if !homeworks.values().any(|h| h.share_code == hw.share_code) {
                break;
            }
            debug!(target: "homework", try_no = n, code = %hw.share_code, "Share code taken; retrying");
            n += 1;
        }
        homeworks.insert(hw.id, hw.clone());
        hw
    }

    /// Remove a homework created by `owner`. Anyone else sees NotFound.
    pub async fn delete_homework(&self, id: Uuid, owner: Uuid) -> AppResult<Homework> {
        let mut homeworks = self.homeworks.write().await;
        match homeworks.get(&id) {
            Some(h) if h.created_by == owner => {}
            _ => return Err(AppError::NotFound("homework")),
        }
        homeworks.remove(&id).ok_or(AppError::NotFound("homework"))
    }

    pub async fn homework(&self, id: Uuid) -> AppResult<Homework> {
        self.homeworks.read().await.get(&id).cloned().ok_or(AppError::NotFound("homework"))
    }

    pub async fn homeworks_by(&self, user: Uuid) -> Vec<Homework> {
        let mut out: Vec<Homework> =
            self.homeworks.read().await.values().filter(|h| h.created_by == user).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub async fn homework_by_share_code(&self, code: &str) -> AppResult<Homework> {
        self.homeworks
            .read()
            .await
            .values()
            .find(|h| h.share_code == code)
            .cloned()
            .ok_or(AppError::NotFound("homework"))
    }

    pub async fn update_homework<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Homework) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut homeworks = self.homeworks.write().await;
        let stored = homeworks.get_mut(&id).ok_or(AppError::NotFound("homework"))?;
        let mut draft = stored.clone();
        let out = f(&mut draft)?;
        draft.updated_at = Utc::now();
        *stored = draft;
        Ok(out)
    }

    // ---------- library ----------

    pub async fn published_books(&self) -> Vec<BookTemplate> {
        let mut out: Vec<BookTemplate> =
            self.books.read().await.values().filter(|b| b.is_published()).cloned().collect();
        out.sort_by(|a, b| a.book_id.cmp(&b.book_id));
        out
    }

    pub async fn published_book(&self, book_id: &str) -> AppResult<BookTemplate> {
        self.books
            .read()
            .await
            .get(book_id)
            .filter(|b| b.is_published())
            .cloned()
            .ok_or(AppError::NotFound("book template"))
    }

    // ---------- activity ----------

    pub async fn log_activity(&self, bank: Uuid, actor: Uuid, action: BankAction, payload: serde_json::Value) {
        self.activity.write().await.push(BankActivity { bank, actor, action, payload, at: Utc::now() });
    }

    /// Activity of one bank, newest first.
    pub async fn activity_for(&self, bank: Uuid) -> Vec<BankActivity> {
        self.activity.read().await.iter().rev().filter(|a| a.bank == bank).cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{AnswerKey, StructureSource};

    pub(crate) fn bank_doc(owner: Uuid) -> QuestionBank {
        let now = Utc::now();
        QuestionBank {
            id: Uuid::new_v4(),
            name: "Bank".into(),
            grade: String::new(),
            subject: String::new(),
            book: String::new(),
            owner,
            members: vec![],
            structure_source: StructureSource::None,
            structure_book_id: None,
            structure_nodes: vec![],
            structure_docx_text: String::new(),
            structure_docx_uploaded_at: None,
            question_count: 0,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn mcq(bank: Uuid, code: &str, node: &str, correct: usize) -> Question {
        Question {
            id: Uuid::new_v4(),
            bank,
            code: code.into(),
            question_type: QuestionType::Mcq,
            content: format!("Q {code}"),
            choices: ["A", "B", "C", "D"].map(String::from).to_vec(),
            answer: AnswerKey::Mcq { correct },
            explanation: String::new(),
            structure_node_id: Some(node.into()),
            created_by: None,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deleted_bank_is_invisible() {
        let store = Store::default();
        let owner = Uuid::new_v4();
        let mut b = bank_doc(owner);
        b.is_deleted = true;
        let id = b.id;
        store.insert_bank(b).await;
        assert!(matches!(store.bank(id).await, Err(AppError::NotFound(_))));
        assert!(store.banks_for(owner).await.is_empty());
        assert!(store.update_bank(id, |_| Ok(())).await.is_err());
    }

    #[tokio::test]
    async fn failed_update_leaves_bank_untouched() {
        let store = Store::default();
        let b = bank_doc(Uuid::new_v4());
        let id = b.id;
        store.insert_bank(b).await;
        let res: AppResult<()> = store
            .update_bank(id, |b| {
                b.name = "changed".into();
                Err(AppError::Validation("nope".into()))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(store.bank(id).await.unwrap().name, "Bank");
    }

    #[tokio::test]
    async fn unordered_insert_skips_duplicate_codes() {
        let store = Store::default();
        let bank = Uuid::new_v4();
        let n = store
            .insert_questions(vec![mcq(bank, "Q1", "l1", 0), mcq(bank, "Q1", "l1", 0), mcq(bank, "Q2", "l1", 0)])
            .await;
        assert_eq!(n, 2);
        // same code in another bank is fine
        assert_eq!(store.insert_questions(vec![mcq(Uuid::new_v4(), "Q1", "l1", 0)]).await, 1);
    }

    #[tokio::test]
    async fn soft_deleted_questions_are_filtered_but_graded() {
        let store = Store::default();
        let bank = Uuid::new_v4();
        let q1 = mcq(bank, "Q1", "l1", 0);
        let q2 = mcq(bank, "Q2", "l2", 0);
        let (id1, id2) = (q1.id, q2.id);
        store.insert_questions(vec![q1, q2]).await;
        store.soft_delete_question(bank, id1).await.unwrap();

        let lessons = vec!["l1".to_string(), "l2".to_string()];
        let filter = QuestionFilter { node_ids: Some(lessons.as_slice()), ..QuestionFilter::bank(bank) };
        let live = store.find_questions(&filter).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, id2);
        assert_eq!(store.count_live_questions(bank).await, 1);
        assert_eq!(store.question_snapshot(&[id1, id2]).await.len(), 2);
        assert!(store.soft_delete_question(bank, id1).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_attempt() {
        let store = std::sync::Arc::new(Store::default());
        let (quiz, user) = (Uuid::new_v4(), Uuid::new_v4());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = store.clone();
                tokio::spawn(async move { s.start_attempt(quiz, user, 3).await })
            })
            .collect();
        let mut ids = HashSet::new();
        let mut fresh = 0;
        for h in handles {
            let (a, reused) = h.await.unwrap();
            ids.insert(a.id);
            if !reused {
                fresh += 1;
            }
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(fresh, 1);
    }

    fn homework_doc(owner: Uuid) -> Homework {
        let now = Utc::now();
        Homework {
            id: Uuid::new_v4(),
            title: "HW".into(),
            description: String::new(),
            class_ids: vec!["c1".into()],
            due_from: None,
            due_to: None,
            allow_view_result: false,
            share_code: String::new(),
            share_url: String::new(),
            attachments: vec![],
            created_by: owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn taken_share_code_is_never_reused() {
        let store = Store::default();
        let owner = Uuid::new_v4();
        let first = store.insert_homework_with_code(homework_doc(owner), |h, _| h.share_code = "dup".into()).await;
        assert_eq!(first.share_code, "dup");

        let mut tries = Vec::new();
        let second = store
            .insert_homework_with_code(homework_doc(owner), |h, n| {
                tries.push(n);
                h.share_code = if n < 3 { "dup".into() } else { format!("fresh{n}") };
            })
            .await;
        assert_eq!(tries, vec![0, 1, 2, 3]);
        assert_eq!(second.share_code, "fresh3");
        assert_eq!(store.homework_by_share_code("fresh3").await.unwrap().id, second.id);
        assert_eq!(store.homework_by_share_code("dup").await.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn only_the_creator_deletes_homework() {
        let store = Store::default();
        let owner = Uuid::new_v4();
        let hw = store.insert_homework_with_code(homework_doc(owner), |h, _| h.share_code = "abc".into()).await;
        assert!(matches!(store.delete_homework(hw.id, Uuid::new_v4()).await, Err(AppError::NotFound(_))));
        assert!(store.homework(hw.id).await.is_ok());
        assert_eq!(store.delete_homework(hw.id, owner).await.unwrap().id, hw.id);
        assert!(matches!(store.homework(hw.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.delete_homework(hw.id, owner).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn submitted_attempt_frees_the_open_slot() {
        let store = Store::default();
        let (quiz, user) = (Uuid::new_v4(), Uuid::new_v4());
        let (a, _) = store.start_attempt(quiz, user, 1).await;
        store
            .finalize_attempt(a.id, |a| {
                a.status = AttemptStatus::Submitted;
                Ok(())
            })
            .await
            .unwrap();
        assert!(matches!(store.finalize_attempt(a.id, |_| Ok(())).await, Err(AppError::AlreadySubmitted)));
        let (b, reused) = store.start_attempt(quiz, user, 1).await;
        assert!(!reused);
        assert_ne!(a.id, b.id);
    }
}
