//! Typed content blocks parsed from a page's serialized content forest.
//!
//! Every stored node is a JSON object with a string `type`, optional `props`,
//! `content` (inline runs, or a table body for tables) and nested `children`.
//! Tags this crate does not know parse into [`BlockKind::Unknown`] so older
//! binaries keep rendering newer content.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockParseError {
    #[error("content is not valid JSON: {0}")]
    Json(String),
    #[error("content root must be an array of blocks")]
    NotAForest,
    #[error("block at `{path}` is not an object with a string `type`")]
    MalformedBlock { path: String },
    #[error("inline content at `{path}` is malformed: {reason}")]
    MalformedInline { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub content: Vec<Inline>,
    pub children: Vec<Block>,
    /// The node exactly as stored, forwarded to client-side components.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Heading { level: i64 },
    Paragraph,
    NumberedListItem,
    BulletListItem,
    CheckListItem { checked: bool },
    Table { rows: Vec<Vec<Vec<Inline>>> },
    Image,
    Video,
    Audio,
    File,
    Alert,
    Code { language: Option<String> },
    Unknown { tag: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text {
        text: String,
        #[serde(default)]
        styles: TextStyles,
    },
    Link {
        href: String,
        #[serde(default)]
        content: Vec<Inline>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextStyles {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
}

/// Parse a serialized content forest. An empty string is an empty forest.
pub fn parse_content(content: &str) -> Result<Vec<Block>, BlockParseError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(content).map_err(|err| BlockParseError::Json(err.to_string()))?;
    parse_forest(&value, "$")
}

pub fn parse_forest(value: &Value, path: &str) -> Result<Vec<Block>, BlockParseError> {
    let Value::Array(nodes) = value else {
        return Err(BlockParseError::NotAForest);
    };

    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| parse_block(node, &format!("{path}[{index}]")))
        .collect()
}

fn parse_block(value: &Value, path: &str) -> Result<Block, BlockParseError> {
    let Some(object) = value.as_object() else {
        return Err(BlockParseError::MalformedBlock {
            path: path.to_string(),
        });
    };
    let Some(tag) = object.get("type").and_then(Value::as_str) else {
        return Err(BlockParseError::MalformedBlock {
            path: path.to_string(),
        });
    };

    let empty = Map::new();
    let props = object
        .get("props")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let children = match object.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(children @ Value::Array(_)) => parse_forest(children, &format!("{path}.children"))?,
        Some(_) => {
            return Err(BlockParseError::MalformedBlock {
                path: format!("{path}.children"),
            });
        }
    };

    let content_value = object.get("content");
    let content_path = format!("{path}.content");

    let kind = match normalize_tag(tag).as_str() {
        "heading" => BlockKind::Heading {
            level: props.get("level").and_then(value_as_i64).unwrap_or(1),
        },
        "paragraph" => BlockKind::Paragraph,
        "numberedlistitem" => BlockKind::NumberedListItem,
        "bulletlistitem" => BlockKind::BulletListItem,
        "checklistitem" => BlockKind::CheckListItem {
            checked: props
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        "table" => BlockKind::Table {
            rows: parse_table(content_value, &content_path)?,
        },
        "image" => BlockKind::Image,
        "video" => BlockKind::Video,
        "audio" => BlockKind::Audio,
        "file" => BlockKind::File,
        "alert" => BlockKind::Alert,
        "codeblock" | "code" => BlockKind::Code {
            language: props
                .get("language")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        _ => BlockKind::Unknown {
            tag: tag.to_string(),
        },
    };

    let content = match kind {
        BlockKind::Table { .. } | BlockKind::Unknown { .. } => Vec::new(),
        _ => parse_inline_list(content_value, &content_path)?,
    };

    Ok(Block {
        kind,
        content,
        children,
        raw: value.clone(),
    })
}

/// Accept both the stored camelCase tags and kebab-case spellings.
fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|ch| *ch != '-' && *ch != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_inline_list(value: Option<&Value>, path: &str) -> Result<Vec<Inline>, BlockParseError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(vec![Inline::Text {
            text: text.clone(),
            styles: TextStyles::default(),
        }]),
        Some(Value::Array(_)) => {
            serde_json::from_value(value.cloned().unwrap_or(Value::Null)).map_err(|err| {
                BlockParseError::MalformedInline {
                    path: path.to_string(),
                    reason: err.to_string(),
                }
            })
        }
        Some(_) => Err(BlockParseError::MalformedInline {
            path: path.to_string(),
            reason: "expected an array of inline runs".to_string(),
        }),
    }
}

/// Table bodies are stored as `{ "type": "tableContent", "rows": [{ "cells": [...] }] }`.
/// A cell is either an inline list or `{ "content": [...] }`.
fn parse_table(
    value: Option<&Value>,
    path: &str,
) -> Result<Vec<Vec<Vec<Inline>>>, BlockParseError> {
    let Some(rows) = value
        .and_then(|content| content.get("rows"))
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    let mut parsed = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        let cells = row
            .get("cells")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut parsed_row = Vec::with_capacity(cells.len());
        for (cell_index, cell) in cells.iter().enumerate() {
            let cell_path = format!("{path}.rows[{row_index}].cells[{cell_index}]");
            let inline = match cell {
                Value::Object(object) => parse_inline_list(object.get("content"), &cell_path)?,
                other => parse_inline_list(Some(other), &cell_path)?,
            };
            parsed_row.push(inline);
        }
        parsed.push(parsed_row);
    }

    Ok(parsed)
}
