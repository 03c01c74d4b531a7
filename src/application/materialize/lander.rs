//! Version-root landing documents.

use serde_json::{Map, Value, json};

use crate::application::render::escape_text;
use crate::domain::entities::{DocumentationRecord, LanderAction, LanderFeature};

use super::meta::url_path;

/// `index.mdx` for a version root: a home page when the documentation carries
/// lander metadata, otherwise a stub that refreshes to the content root.
///
/// Front matter values are emitted as JSON, which YAML reads as flow
/// collections and double-quoted scalars, so no value can break the block.
pub fn render_landing(
    documentation: &DocumentationRecord,
    version: &str,
    base_segments: &[String],
) -> Result<String, serde_json::Error> {
    let target = url_path(
        std::iter::once(version).chain(base_segments.iter().map(String::as_str)),
    );
    let title = serde_json::to_string(&documentation.name)?;

    let lander = documentation
        .lander
        .as_ref()
        .filter(|lander| !lander.is_empty());

    let Some(lander) = lander else {
        return Ok(format!(
            "---\ntitle: {title}\npageType: \"blank\"\n---\n\n\
             <meta httpEquiv=\"refresh\" content={{{}}} />\n\n\
             [{}]({target})\n",
            serde_json::to_string(&format!("0; url={target}"))?,
            escape_text(&documentation.name),
        ));
    };

    let mut hero = Map::new();
    let name = lander
        .hero
        .as_ref()
        .map_or(documentation.name.as_str(), |hero| hero.title.as_str());
    hero.insert("name".to_string(), json!(name));
    if let Some(text) = lander.hero.as_ref().and_then(|hero| hero.subtitle.as_ref()) {
        hero.insert("text".to_string(), json!(text));
    }
    if let Some(tagline) = lander.hero.as_ref().and_then(|hero| hero.text.as_ref()) {
        hero.insert("tagline".to_string(), json!(tagline));
    }
    let actions: Vec<Value> = if lander.actions.is_empty() {
        vec![json!({ "theme": "brand", "text": documentation.name, "link": target })]
    } else {
        lander.actions.iter().map(action).collect()
    };
    hero.insert("actions".to_string(), Value::Array(actions));

    let mut front = format!("---\ntitle: {title}\npageType: \"home\"\n");
    front.push_str(&format!("hero: {}\n", serde_json::to_string(&hero)?));
    if !lander.features.is_empty() {
        let features: Vec<Value> = lander.features.iter().map(feature).collect();
        front.push_str(&format!("features: {}\n", serde_json::to_string(&features)?));
    }
    front.push_str("---\n");
    Ok(front)
}

fn action(action: &LanderAction) -> Value {
    json!({
        "theme": action.variant.as_deref().unwrap_or("brand"),
        "text": action.label,
        "link": action.href,
    })
}

fn feature(feature: &LanderFeature) -> Value {
    let mut entry = Map::new();
    entry.insert("title".to_string(), json!(feature.title));
    if let Some(details) = &feature.details {
        entry.insert("details".to_string(), json!(details));
    }
    if let Some(icon) = &feature.icon {
        entry.insert("icon".to_string(), json!(icon));
    }
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::domain::entities::{LanderAction, LanderHero, LanderMetadata};

    fn documentation(lander: Option<LanderMetadata>) -> DocumentationRecord {
        DocumentationRecord {
            id: Uuid::from_u128(1),
            name: "Guide \"Pro\"".to_string(),
            version: "1.0".to_string(),
            base_url: "guide".to_string(),
            cloned_from: None,
            primary_color: None,
            logo_url: None,
            favicon_url: None,
            custom_css: None,
            lander,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn missing_lander_renders_redirect_stub() {
        let output = render_landing(
            &documentation(None),
            "1.0",
            &["guide".to_string(), "api".to_string()],
        )
        .expect("landing");
        assert!(output.starts_with("---\ntitle: \"Guide \\\"Pro\\\"\"\npageType: \"blank\"\n"));
        assert!(output.contains("url=/1.0/guide/api"));
        assert!(output.ends_with("[Guide \"Pro\"](/1.0/guide/api)\n"));
    }

    #[test]
    fn empty_lander_counts_as_missing() {
        let output = render_landing(
            &documentation(Some(LanderMetadata::default())),
            "1.0",
            &["guide".to_string()],
        )
        .expect("landing");
        assert!(output.contains("pageType: \"blank\""));
    }

    #[test]
    fn lander_renders_hero_front_matter() {
        let lander = LanderMetadata {
            hero: Some(LanderHero {
                title: "Welcome".to_string(),
                subtitle: Some("Fast docs".to_string()),
                text: None,
            }),
            actions: vec![LanderAction {
                label: "Start".to_string(),
                href: "/1.0/guide".to_string(),
                variant: Some("primary".to_string()),
            }],
            features: Vec::new(),
        };
        let output = render_landing(&documentation(Some(lander)), "1.0", &["guide".to_string()])
            .expect("landing");
        assert!(output.contains("pageType: \"home\""));
        assert!(output.contains(
            "hero: {\"actions\":[{\"link\":\"/1.0/guide\",\"text\":\"Start\",\"theme\":\"primary\"}],\"name\":\"Welcome\",\"text\":\"Fast docs\"}"
        ));
        assert!(!output.contains("features:"));
        assert!(output.ends_with("}\n---\n"));
    }
}
