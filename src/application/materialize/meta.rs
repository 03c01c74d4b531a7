use serde::Serialize;

use crate::domain::ordering::compare_siblings;
use crate::domain::types::MetaEntryType;

/// One navigable entry of a `_meta.json` sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEntry {
    #[serde(rename = "type")]
    pub kind: MetaEntryType,
    pub name: String,
    pub label: String,
    pub path: String,
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl MetaEntry {
    pub fn file(
        name: impl Into<String>,
        label: impl Into<String>,
        path: String,
        order: Option<i32>,
    ) -> Self {
        Self {
            kind: MetaEntryType::File,
            name: name.into(),
            label: label.into(),
            path,
            order,
            hidden: false,
        }
    }

    pub fn dir(
        name: impl Into<String>,
        label: impl Into<String>,
        path: String,
        order: Option<i32>,
    ) -> Self {
        Self {
            kind: MetaEntryType::Dir,
            name: name.into(),
            label: label.into(),
            path,
            order,
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Sort by (order ascending, absent last, then name) and serialize.
pub fn render_sidecar(mut entries: Vec<MetaEntry>) -> Result<String, serde_json::Error> {
    entries.sort_by(|a, b| compare_siblings(a.order, &a.name, b.order, &b.name));
    let mut json = serde_json::to_string_pretty(&entries)?;
    json.push('\n');
    Ok(json)
}

/// Join URL segments into an absolute path (`/1.0/guide/setup`).
pub fn url_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_entries_sort_by_order_then_name() {
        let entries = vec![
            MetaEntry::file("zeta", "Zeta", "/1.0/zeta".to_string(), None),
            MetaEntry::dir("setup", "Setup", "/1.0/setup".to_string(), Some(1)),
            MetaEntry::file("alpha", "Alpha", "/1.0/alpha".to_string(), None),
            MetaEntry::file("intro", "Intro", "/1.0/intro".to_string(), Some(0)),
        ];

        let json = render_sidecar(entries.clone()).expect("json");
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).expect("parse");
        let names: Vec<&str> = parsed
            .iter()
            .map(|entry| entry["name"].as_str().expect("name"))
            .collect();
        assert_eq!(names, vec!["intro", "setup", "alpha", "zeta"]);
        assert_eq!(parsed[1]["type"], "dir");
        assert!(parsed[0].get("hidden").is_none());

        let mut reversed = entries;
        reversed.reverse();
        assert_eq!(render_sidecar(reversed).expect("json"), json);
    }

    #[test]
    fn url_path_joins_segments() {
        assert_eq!(url_path(["1.0", "guide", "setup"]), "/1.0/guide/setup");
        assert_eq!(url_path(Vec::<&str>::new()), "/");
    }
}
