//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::BuildStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentationRecord {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub base_url: String,
    pub cloned_from: Option<Uuid>,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub custom_css: Option<String>,
    pub lander: Option<LanderMetadata>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Landing page metadata. When present the version root renders a hero
/// document instead of a redirect stub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanderMetadata {
    #[serde(default)]
    pub hero: Option<LanderHero>,
    #[serde(default)]
    pub actions: Vec<LanderAction>,
    #[serde(default)]
    pub features: Vec<LanderFeature>,
}

impl LanderMetadata {
    pub fn is_empty(&self) -> bool {
        self.hero.is_none() && self.actions.is_empty() && self.features.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanderHero {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanderAction {
    pub label: String,
    pub href: String,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanderFeature {
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageGroupRecord {
    pub id: Uuid,
    pub documentation_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub order: Option<i32>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub documentation_id: Uuid,
    pub page_group_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    /// Serialized block forest (JSON array).
    pub content: String,
    pub order: Option<i32>,
    pub is_intro_page: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildTriggerRecord {
    pub id: Uuid,
    pub documentation_id: Uuid,
    pub triggered: bool,
    pub status: BuildStatus,
    pub last_error: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
}
