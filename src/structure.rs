//! Structure builder: maintains the topic/lesson forest of a question bank.
//!
//! Sources are a library book template, free text (DOCX already extracted
//! upstream), or a manual node list from the editor. Every mutation writes the
//! whole node list back to the bank.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{BankAction, BookTemplate, NodeMeta, NodeType, StructureNode, StructureSource};
use crate::error::{AppError, AppResult};
use crate::seeder;
use crate::state::AppState;
use crate::util::{fill_template, node_id, non_blank, parse_id, trunc_for_log};

const LESSON_TITLE_TEMPLATE: &str = "Bài {code}: {title}";
const EMPTY_DOCX_PREVIEW: &str = "Chưa có nội dung DOCX để xem trước.";

/// Map a client-supplied source label onto the stored enum.
/// Unknown labels collapse to `None`; `openquiz_library` is an old name for the library source.
pub fn normalize_source(input: Option<&str>) -> StructureSource {
  match input.map(str::trim).unwrap_or_default() {
    "azota_library" | "openquiz_library" => StructureSource::AzotaLibrary,
    "pdf_upload" => StructureSource::PdfUpload,
    "docx_upload" | "docx_preview" => StructureSource::DocxUpload,
    _ => StructureSource::None,
  }
}

/// Units become topics, lessons become their children.
pub fn flatten_book(book: &BookTemplate) -> Vec<StructureNode> {
  let mut nodes = Vec::new();
  for (ui, unit) in book.units.iter().enumerate() {
    nodes.push(StructureNode {
      id: unit.id.clone(),
      parent_id: None,
      title: unit.title.clone(),
      node_type: NodeType::Topic,
      order: ui as i64,
      meta: NodeMeta::default(),
    });
    for (li, lesson) in unit.lessons.iter().enumerate() {
      nodes.push(StructureNode {
        id: lesson.id.clone(),
        parent_id: Some(unit.id.clone()),
        title: fill_template(LESSON_TITLE_TEMPLATE, &[("code", &lesson.code), ("title", &lesson.title)]),
        node_type: NodeType::Lesson,
        order: li as i64,
        meta: NodeMeta { code: Some(lesson.code.clone()), ..Default::default() },
      });
    }
  }
  nodes
}

/// Heuristic outline parser. A heading line opens a topic; any other line is a
/// lesson of the latest topic. The very first line always opens a topic.
pub fn build_from_text(text: &str, headings: &[Regex]) -> Vec<StructureNode> {
  let is_heading = |line: &str| headings.iter().any(|re| re.is_match(line));

  let mut nodes = Vec::new();
  let mut current_topic: Option<String> = None;
  let mut topic_order: i64 = -1;
  let mut lesson_order: i64 = 0;

  for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
    match &current_topic {
      Some(parent) if !is_heading(line) => {
        nodes.push(StructureNode {
          id: node_id("l"),
          parent_id: Some(parent.clone()),
          title: line.to_string(),
          node_type: NodeType::Lesson,
          order: lesson_order,
          meta: NodeMeta::default(),
        });
        lesson_order += 1;
      }
      _ => {
        topic_order += 1;
        lesson_order = 0;
        let id = node_id("t");
        nodes.push(StructureNode {
          id: id.clone(),
          parent_id: None,
          title: line.to_string(),
          node_type: NodeType::Topic,
          order: topic_order,
          meta: NodeMeta::default(),
        });
        current_topic = Some(id);
      }
    }
  }
  nodes
}

/// `root` plus every node reachable from it through parent -> child edges.
/// Nodes with a dangling parent are never reached.
pub fn collect_descendants(nodes: &[StructureNode], root: &str) -> HashSet<String> {
  let mut children: HashMap<Option<&str>, Vec<&str>> = HashMap::new();
  for n in nodes {
    children.entry(n.parent_id.as_deref()).or_default().push(&n.id);
  }

  let mut found = HashSet::from([root.to_string()]);
  let mut stack = vec![root];
  while let Some(cur) = stack.pop() {
    for &kid in children.get(&Some(cur)).map(Vec::as_slice).unwrap_or_default() {
      if found.insert(kid.to_string()) {
        stack.push(kid);
      }
    }
  }
  found
}

/// Ids non-empty and unique, titles non-empty, parents present, no cycles.
pub fn validate_nodes(nodes: &[StructureNode]) -> AppResult<()> {
  let mut parent_of: HashMap<&str, Option<&str>> = HashMap::with_capacity(nodes.len());
  for n in nodes {
    if n.id.trim().is_empty() {
      return Err(AppError::Validation("node id is required".into()));
    }
    if n.title.trim().is_empty() {
      return Err(AppError::Validation(format!("node {} has an empty title", n.id)));
    }
    if parent_of.insert(&n.id, n.parent_id.as_deref()).is_some() {
      return Err(AppError::Validation(format!("duplicate node id {}", n.id)));
    }
  }
  for n in nodes {
    if let Some(p) = n.parent_id.as_deref() {
      if !parent_of.contains_key(p) {
        return Err(AppError::Validation(format!("node {} references missing parent {}", n.id, p)));
      }
    }
    // Walking up more than len steps means a loop.
    let mut cur = n.parent_id.as_deref();
    let mut steps = 0;
    while let Some(p) = cur {
      steps += 1;
      if p == n.id || steps > nodes.len() {
        return Err(AppError::Validation(format!("cycle through node {}", n.id)));
      }
      cur = parent_of.get(p).copied().flatten();
    }
  }
  Ok(())
}

// -------- bank-level operations --------

#[instrument(level = "debug", skip(state), fields(%bank_id))]
pub async fn get_structure(state: &AppState, bank_id: &str) -> AppResult<(StructureSource, Vec<StructureNode>)> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  Ok((bank.structure_source, bank.structure_nodes))
}

/// Replace the structure with the book's units and lessons, then seed
/// `seed_total` placeholder questions over its lessons (0 skips seeding).
/// Returns the stored nodes and how many questions were seeded.
#[instrument(level = "info", skip(state), fields(%bank_id, %book_id))]
pub async fn apply_from_library(
  state: &AppState,
  actor: Uuid,
  bank_id: &str,
  book_id: &str,
  seed_total: usize,
) -> AppResult<(Vec<StructureNode>, usize)> {
  let bank_id = parse_id("bank", bank_id)?;
  let book = state.store.published_book(book_id).await?;
  let nodes = flatten_book(&book);

  let stored = state
    .store
    .update_bank(bank_id, |bank| {
      bank.structure_source = StructureSource::AzotaLibrary;
      bank.structure_book_id = Some(book.book_id.clone());
      bank.structure_nodes = nodes;
      Ok(bank.structure_nodes.clone())
    })
    .await?;

  state
    .store
    .log_activity(bank_id, actor, BankAction::StructureCreated, json!({ "source": "azota_library", "bookId": book_id }))
    .await;
  info!(target: "structure", %bank_id, %book_id, nodes = stored.len(), "Structure applied from library");

  let lesson_ids: Vec<String> =
    stored.iter().filter(|n| n.node_type == NodeType::Lesson).map(|n| n.id.clone()).collect();
  let seeded = if seed_total == 0 || lesson_ids.is_empty() {
    0
  } else {
    seeder::seed_for_bank(state, &bank_id.to_string(), &lesson_ids, seed_total, actor).await?
  };
  Ok((stored, seeded))
}

/// Replace the node list with the editor's copy.
/// `raw_nodes` must be a JSON array of nodes.
#[instrument(level = "info", skip(state, raw_nodes), fields(%bank_id))]
pub async fn save_manual(
  state: &AppState,
  actor: Uuid,
  bank_id: &str,
  raw_nodes: serde_json::Value,
  source: Option<&str>,
) -> AppResult<(StructureSource, Vec<StructureNode>)> {
  let bank_id = parse_id("bank", bank_id)?;
  if !raw_nodes.is_array() {
    return Err(AppError::InvalidArgument("structureNodes must be an array".into()));
  }
  let nodes: Vec<StructureNode> =
    serde_json::from_value(raw_nodes).map_err(|e| AppError::Validation(e.to_string()))?;
  validate_nodes(&nodes)?;
  let source = normalize_source(source);

  let saved = state
    .store
    .update_bank(bank_id, |bank| {
      bank.structure_source = source;
      bank.structure_nodes = nodes;
      Ok((bank.structure_source, bank.structure_nodes.clone()))
    })
    .await?;

  state
    .store
    .log_activity(bank_id, actor, BankAction::StructureUpdated, json!({ "nodes": saved.1.len() }))
    .await;
  info!(target: "structure", %bank_id, source = ?saved.0, nodes = saved.1.len(), "Structure saved");
  Ok(saved)
}

#[instrument(level = "info", skip(state, title), fields(%bank_id, %node_id))]
pub async fn rename_node(
  state: &AppState,
  bank_id: &str,
  node_id: &str,
  title: &str,
) -> AppResult<Vec<StructureNode>> {
  let bank_id = parse_id("bank", bank_id)?;
  let title = non_blank(title).ok_or_else(|| AppError::InvalidArgument("title is required".into()))?.to_string();

  state
    .store
    .update_bank(bank_id, |bank| {
      let node = bank
        .structure_nodes
        .iter_mut()
        .find(|n| n.id == node_id)
        .ok_or(AppError::NotFound("structure node"))?;
      node.title = title;
      Ok(bank.structure_nodes.clone())
    })
    .await
}

#[instrument(level = "info", skip(state), fields(%bank_id, %node_id))]
pub async fn delete_node(state: &AppState, bank_id: &str, node_id: &str) -> AppResult<Vec<StructureNode>> {
  let bank_id = parse_id("bank", bank_id)?;
  state
    .store
    .update_bank(bank_id, |bank| {
      if bank.node(node_id).is_none() {
        return Err(AppError::NotFound("structure node"));
      }
      let doomed = collect_descendants(&bank.structure_nodes, node_id);
      bank.structure_nodes.retain(|n| !doomed.contains(&n.id));
      debug!(target: "structure", removed = doomed.len(), "Node subtree removed");
      Ok(bank.structure_nodes.clone())
    })
    .await
}

/// Cache extracted DOCX text for preview before it is turned into nodes.
#[instrument(level = "info", skip(state, text), fields(%bank_id, text_len = text.len()))]
pub async fn upload_docx_text(state: &AppState, bank_id: &str, text: String) -> AppResult<DateTime<Utc>> {
  let bank_id = parse_id("bank", bank_id)?;
  debug!(target: "structure", %bank_id, head = %trunc_for_log(&text, 80), "Caching DOCX text");
  state
    .store
    .update_bank(bank_id, |bank| {
      let now = Utc::now();
      bank.structure_docx_text = text;
      bank.structure_docx_uploaded_at = Some(now);
      Ok(now)
    })
    .await
}

pub async fn preview_docx(state: &AppState, bank_id: &str) -> AppResult<(String, Option<DateTime<Utc>>)> {
  let bank = state.store.bank(parse_id("bank", bank_id)?).await?;
  let text = match non_blank(&bank.structure_docx_text) {
    Some(_) => bank.structure_docx_text,
    None => EMPTY_DOCX_PREVIEW.to_string(),
  };
  Ok((text, bank.structure_docx_uploaded_at))
}

/// Build nodes from the cached DOCX text unless the bank already has a structure.
/// Returns the nodes and whether they were newly created.
#[instrument(level = "info", skip(state), fields(%bank_id))]
pub async fn apply_from_docx(state: &AppState, actor: Uuid, bank_id: &str) -> AppResult<(Vec<StructureNode>, bool)> {
  let bank_id = parse_id("bank", bank_id)?;
  let headings = &state.headings;
  let (nodes, created) = state
    .store
    .update_bank(bank_id, |bank| {
      if !bank.structure_nodes.is_empty() {
        return Ok((bank.structure_nodes.clone(), false));
      }
      bank.structure_nodes = build_from_text(&bank.structure_docx_text, headings);
      bank.structure_source = StructureSource::DocxUpload;
      Ok((bank.structure_nodes.clone(), true))
    })
    .await?;

  if created {
    state
      .store
      .log_activity(bank_id, actor, BankAction::StructureCreated, json!({ "source": "docx_upload", "nodes": nodes.len() }))
      .await;
    info!(target: "structure", %bank_id, nodes = nodes.len(), "Structure created from DOCX text");
  }
  Ok((nodes, created))
}
