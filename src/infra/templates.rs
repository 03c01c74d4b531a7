//! Site scaffold template bundle.
//!
//! The bundle ships embedded in the binary (`include_dir`) and can be replaced
//! at runtime by a directory on disk with the same layout:
//!
//! - `scaffold/` is copied into every site root. Files ending in `.tmpl` have
//!   the suffix stripped and their `{{ token }}` placeholders substituted.
//! - `styles/base.css` is the base stylesheet prepended to each version's
//!   `styles.css`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use include_dir::{Dir, include_dir};

static EMBEDDED_TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates/site");

const SCAFFOLD_DIR: &str = "scaffold";
const BASE_STYLESHEET: &str = "styles/base.css";
const TEMPLATE_SUFFIX: &str = ".tmpl";

/// File whose presence marks an initialized site root.
pub const SCAFFOLD_MARKER: &str = "package.json";

#[derive(Debug, Clone)]
struct TemplateFile {
    path: PathBuf,
    contents: Vec<u8>,
}

/// A scaffold file ready to be written, relative to the site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Values substituted into `.tmpl` files. Free-text values are placed inside
/// double-quoted JSON and JavaScript strings, so build them with
/// [`quoted_fragment`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub title: String,
    pub base_url: String,
    pub version: String,
    pub primary_color: String,
    pub logo_url: String,
    pub favicon_url: String,
    /// Every version label of the lineage as a JSON array literal.
    pub versions: String,
}

impl TemplateContext {
    fn tokens(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("title", self.title.as_str()),
            ("base_url", self.base_url.as_str()),
            ("version", self.version.as_str()),
            ("primary_color", self.primary_color.as_str()),
            ("logo_url", self.logo_url.as_str()),
            ("favicon_url", self.favicon_url.as_str()),
            ("versions", self.versions.as_str()),
        ])
    }
}

/// `value` escaped for the inside of a double-quoted JSON or JavaScript string.
pub fn quoted_fragment(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[derive(Debug, Clone)]
pub struct TemplateBundle {
    scaffold: Vec<TemplateFile>,
    base_stylesheet: String,
}

impl TemplateBundle {
    /// The bundle compiled into the binary.
    pub fn embedded() -> Self {
        let mut files = Vec::new();
        collect_embedded(&EMBEDDED_TEMPLATES, &mut files);
        Self::from_files(files)
    }

    /// Load a bundle from disk, replacing the embedded one entirely.
    pub fn from_dir(root: &Path) -> io::Result<Self> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    stack.push(path);
                } else if let Ok(relative) = path.strip_prefix(root) {
                    files.push(TemplateFile {
                        path: relative.to_path_buf(),
                        contents: std::fs::read(&path)?,
                    });
                }
            }
        }
        Ok(Self::from_files(files))
    }

    fn from_files(files: Vec<TemplateFile>) -> Self {
        let mut scaffold = Vec::new();
        let mut base_stylesheet = String::new();
        for file in files {
            if file.path == Path::new(BASE_STYLESHEET) {
                base_stylesheet = String::from_utf8_lossy(&file.contents).into_owned();
            } else if let Ok(relative) = file.path.strip_prefix(SCAFFOLD_DIR) {
                scaffold.push(TemplateFile {
                    path: relative.to_path_buf(),
                    contents: file.contents,
                });
            }
        }
        scaffold.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            scaffold,
            base_stylesheet,
        }
    }

    pub fn base_stylesheet(&self) -> &str {
        &self.base_stylesheet
    }

    pub fn is_empty(&self) -> bool {
        self.scaffold.is_empty()
    }

    /// Render every scaffold file for one site root, sorted by path.
    pub fn render(&self, context: &TemplateContext) -> Vec<RenderedFile> {
        let tokens = context.tokens();
        self.scaffold
            .iter()
            .map(|file| match strip_template_suffix(&file.path) {
                Some(path) => RenderedFile {
                    path,
                    contents: substitute(&String::from_utf8_lossy(&file.contents), &tokens)
                        .into_bytes(),
                },
                None => RenderedFile {
                    path: file.path.clone(),
                    contents: file.contents.clone(),
                },
            })
            .collect()
    }
}

impl Default for TemplateBundle {
    fn default() -> Self {
        Self::embedded()
    }
}

fn collect_embedded(dir: &Dir<'_>, files: &mut Vec<TemplateFile>) {
    for file in dir.files() {
        files.push(TemplateFile {
            path: file.path().to_path_buf(),
            contents: file.contents().to_vec(),
        });
    }
    for nested in dir.dirs() {
        collect_embedded(nested, files);
    }
}

fn strip_template_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_suffix(TEMPLATE_SUFFIX)?;
    Some(path.with_file_name(stripped))
}

/// Replace `{{ name }}` placeholders. Unknown names are left untouched.
pub fn substitute(template: &str, tokens: &BTreeMap<&'static str, &str>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = after_open[..end].trim();
        match tokens.get(key) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}
