//! Deterministic file and directory names for materialized nodes.
//!
//! Titles go through ASCII slugification (`slug` crate) with Chinese
//! transliteration (`pinyin` crate) so a page titled “基线对齐” lands in
//! `ji-xian-dui-qi.mdx`.

use std::collections::{HashMap, HashSet};

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Name reserved for the intro page of a directory.
pub const INDEX_NAME: &str = "index";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Hands out unique names within one directory.
///
/// Duplicates receive monotonic suffixes (`setup`, `setup-2`, `setup-3`). The
/// `index` name is held back for the intro page; any other node whose title
/// slugifies to `index` is suffixed. Every name handed out is reserved, so a
/// title that slugifies to an earlier suffixed name is suffixed in turn.
#[derive(Debug)]
pub struct SiblingNamer {
    occurrences: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl SiblingNamer {
    pub fn new() -> Self {
        Self {
            occurrences: HashMap::new(),
            taken: HashSet::from([INDEX_NAME.to_string()]),
        }
    }

    /// Name for a regular node. `fallback` is used when the title has no
    /// representable characters.
    pub fn name_for(&mut self, title: &str, fallback: &str) -> String {
        let base = derive_slug(title)
            .or_else(|_| derive_slug(fallback))
            .unwrap_or_else(|_| "untitled".to_string());
        let count = self.occurrences.entry(base.clone()).or_insert(0);

        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{base}-{}", *count)
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

impl Default for SiblingNamer {
    fn default() -> Self {
        Self::new()
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}
