//! Per-site record of which documentation fills which version directory.
//!
//! The manifest outlives the rows it describes: once a version is deleted the
//! database can no longer say which lineage it belonged to, so the site that
//! published it is found by scanning the manifests under the data root.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::application::versions::{ShadowedVersion, VersionSet};

pub const MANIFEST_FILE: &str = "docsmith.versions.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub root_id: Uuid,
    pub latest: String,
    pub versions: Vec<ManifestVersion>,
    #[serde(default)]
    pub shadowed: Vec<ShadowedVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub label: String,
    pub documentation_id: Uuid,
}

impl VersionManifest {
    pub fn from_version_set(root_id: Uuid, set: &VersionSet) -> Self {
        Self {
            root_id,
            latest: set.latest.clone(),
            versions: set
                .members
                .iter()
                .map(|member| ManifestVersion {
                    label: member.label.clone(),
                    documentation_id: member.documentation.id,
                })
                .collect(),
            shadowed: set.shadowed.clone(),
        }
    }

    /// Whether `documentation_id` was published, or shadowed, by this site.
    pub fn mentions(&self, documentation_id: Uuid) -> bool {
        self.root_id == documentation_id
            || self
                .versions
                .iter()
                .any(|version| version.documentation_id == documentation_id)
            || self
                .shadowed
                .iter()
                .any(|version| version.documentation_id == documentation_id)
    }

    pub fn render(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Read the manifest of one site. A missing or unreadable manifest is `None`.
pub async fn read_manifest(site_root: &Path) -> Option<VersionManifest> {
    let path = site_root.join(MANIFEST_FILE);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn_manifest(&path, &err.to_string());
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            warn_manifest(&path, &err.to_string());
            None
        }
    }
}

/// Lineage root of the site whose manifest lists `documentation_id`.
pub async fn find_owner(data_root: &Path, documentation_id: Uuid) -> Option<Uuid> {
    let mut entries = match fs::read_dir(data_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn_manifest(data_root, &err.to_string());
            return None;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn_manifest(data_root, &err.to_string());
                return None;
            }
        };
        if !entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
            continue;
        }
        if let Some(manifest) = read_manifest(&entry.path()).await {
            if manifest.mentions(documentation_id) {
                return Some(manifest.root_id);
            }
        }
    }
}

fn warn_manifest(path: &Path, error: &str) {
    warn!(
        target = "application::materialize::manifest",
        path = %path.display(),
        error = %error,
        "Failed to read version manifest"
    );
}
