mod support;

use std::time::Duration;

use docsmith::application::materialize::MaterializeOutcome;
use docsmith::application::pipeline::{BuildPipeline, PassOutcome};
use docsmith::application::structure::StructureService;
use docsmith::application::toolchain::ToolStep;
use docsmith::domain::entities::DocumentationRecord;
use docsmith::domain::types::{BuildOutcome, BuildStatus};
use support::{FakeToolchain, Harness, documentation, group, page, read_json, snapshot_tree};
use tempfile::TempDir;

fn written(outcome: MaterializeOutcome) -> docsmith::application::materialize::MaterializeReport {
    match outcome {
        MaterializeOutcome::Written(report) => report,
        other => panic!("expected a written site, got {other:?}"),
    }
}

#[tokio::test]
async fn intro_page_becomes_index_of_the_base_url() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    let report = written(harness.materializer.materialize(guide.id).await.expect("materialize"));

    let content_root = report.site_root.join("docs/1.0/guide");
    let intro = std::fs::read_to_string(content_root.join("index.mdx")).expect("index.mdx");
    assert!(intro.starts_with("---\ntitle: \"Intro\"\n---\n"));
    assert!(intro.contains("Intro"));

    let sidecar = read_json(&content_root.join("_meta.json"));
    let entries = sidecar.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["type"], "file");
    assert_eq!(entries[0]["name"], "index");
    assert_eq!(entries[0]["path"], "/1.0/guide");

    let version_sidecar = read_json(&report.site_root.join("docs/1.0/_meta.json"));
    assert_eq!(version_sidecar[0]["type"], "dir");
    assert_eq!(version_sidecar[0]["name"], "guide");

    assert!(report.site_root.join("package.json").exists());
    assert!(report.site_root.join("docs/1.0/index.mdx").exists());
    assert!(report.site_root.join("docs/1.0/styles.css").exists());
    assert_eq!(report.versions, vec!["1.0".to_string()]);
}

#[tokio::test]
async fn group_pages_land_in_a_directory_in_order() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));
    let setup = group(guide.id, None, "Setup", Some(1));
    harness.store.add_group(setup.clone());
    harness
        .store
        .add_page(page(guide.id, Some(setup.id), "Configure", Some(1), false));
    harness
        .store
        .add_page(page(guide.id, Some(setup.id), "Install", Some(0), false));

    let report = written(harness.materializer.materialize(guide.id).await.expect("materialize"));
    let content_root = report.site_root.join("docs/1.0/guide");

    assert!(content_root.join("setup/install.mdx").exists());
    assert!(content_root.join("setup/configure.mdx").exists());

    let nested = read_json(&content_root.join("setup/_meta.json"));
    let names: Vec<&str> = nested
        .as_array()
        .expect("array")
        .iter()
        .map(|entry| entry["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["install", "configure"]);
    assert_eq!(nested[0]["path"], "/1.0/guide/setup/install");

    let parent = read_json(&content_root.join("_meta.json"));
    let setup_entry = parent
        .as_array()
        .expect("array")
        .iter()
        .find(|entry| entry["name"] == "setup")
        .expect("setup entry");
    assert_eq!(setup_entry["type"], "dir");
    assert_eq!(setup_entry["label"], "Setup");
}

#[tokio::test]
async fn forked_version_detaches_groups_outside_the_clone() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    let other = documentation("Other", "1.0", "other", 1);
    harness.store.add_documentation(guide.clone());
    harness.store.add_documentation(other.clone());

    let foreign = group(other.id, None, "Foreign", None);
    harness.store.add_group(foreign.clone());
    harness
        .store
        .add_group(group(guide.id, Some(foreign.id), "Advanced", Some(0)));
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    let service = StructureService::new(harness.repositories(), harness.ledger.clone());
    let created = service
        .create_version(guide.id, "2.0")
        .await
        .expect("create version");

    assert_eq!(created.cloned_from, Some(guide.id));
    assert_eq!(created.version, "2.0");

    let cloned_groups = harness.store.groups_of(created.id);
    assert_eq!(cloned_groups.len(), 1);
    assert_eq!(cloned_groups[0].name, "Advanced");
    assert_eq!(cloned_groups[0].parent_id, None);
    assert_eq!(harness.store.pages_of(created.id).len(), 1);

    let triggers = harness.store.triggers();
    assert!(triggers.iter().any(|row| row.documentation_id == created.id));

    // Building the fork materializes both versions under the root's site.
    let report = written(harness.materializer.materialize(created.id).await.expect("materialize"));
    assert_eq!(report.root_id, guide.id);
    assert_eq!(report.versions, vec!["1.0".to_string(), "2.0".to_string()]);
    assert!(report.site_root.join("docs/2.0/guide/advanced/_meta.json").exists());
}

#[tokio::test]
async fn two_triggers_collapse_into_one_pass() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    harness.ledger.add_trigger(guide.id).await;
    harness.ledger.add_trigger(guide.id).await;

    let report = harness.scheduler.drain_once().await.expect("drain");
    assert_eq!(report.passes, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.triggers, 2);

    let rows = harness.store.triggers();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.triggered));
    assert!(rows.iter().all(|row| row.status == BuildStatus::Succeeded));
    assert!(rows.iter().all(|row| row.completed_at.is_some()));

    assert_eq!(harness.toolchain.count(ToolStep::Install), 1);
    assert_eq!(harness.toolchain.count(ToolStep::Build), 1);

    let site = harness.materializer.site_root(guide.id);
    assert!(site.join("build/index.html").exists());
    assert!(!site.join("build_tmp").exists());

    let again = harness.scheduler.drain_once().await.expect("drain");
    assert_eq!(again.passes, 0);
}

#[tokio::test]
async fn unchanged_documentation_rewrites_nothing() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));
    let setup = group(guide.id, None, "Setup", None);
    harness.store.add_group(setup.clone());
    harness
        .store
        .add_page(page(guide.id, Some(setup.id), "Install", None, false));

    let first = written(harness.materializer.materialize(guide.id).await.expect("first"));
    assert!(first.files.written > 0);
    let before = snapshot_tree(&first.site_root);

    let second = written(harness.materializer.materialize(guide.id).await.expect("second"));
    assert_eq!(second.files.written, 0);
    assert_eq!(second.files.pruned, 0);
    assert_eq!(second.files.skipped, first.files.written);
    assert_eq!(snapshot_tree(&second.site_root), before);
}

#[tokio::test]
async fn edited_page_rewrites_only_that_page() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    let intro = page(guide.id, None, "Intro", Some(0), true);
    harness.store.add_page(intro.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Usage", Some(1), false));

    written(harness.materializer.materialize(guide.id).await.expect("first"));
    harness
        .store
        .update_page_content(intro.id, &support::paragraph("Welcome aboard"));

    let second = written(harness.materializer.materialize(guide.id).await.expect("second"));
    assert_eq!(second.files.written, 1);

    let index = std::fs::read_to_string(second.site_root.join("docs/1.0/guide/index.mdx"))
        .expect("index");
    assert!(index.contains("Welcome aboard"));
}

#[tokio::test]
async fn removed_pages_and_groups_are_pruned() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));
    let setup = group(guide.id, None, "Setup", None);
    harness.store.add_group(setup.clone());
    harness
        .store
        .add_page(page(guide.id, Some(setup.id), "Install", None, false));

    let first = written(harness.materializer.materialize(guide.id).await.expect("first"));
    let setup_dir = first.site_root.join("docs/1.0/guide/setup");
    assert!(setup_dir.join("install.mdx").exists());

    // Rebuild the store without the group and its page.
    harness.store.remove_documentation(guide.id);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    let second = written(harness.materializer.materialize(guide.id).await.expect("second"));
    assert!(second.files.pruned >= 2);
    assert!(!setup_dir.exists());
    assert!(second.site_root.join("docs/1.0/guide/index.mdx").exists());
    assert!(second.site_root.join("package.json").exists());
}

#[tokio::test]
async fn deleted_documentation_loses_its_site_directory() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    harness.ledger.add_trigger(guide.id).await;
    harness.scheduler.drain_once().await.expect("drain");
    let site = harness.materializer.site_root(guide.id);
    assert!(site.join("build").exists());

    harness.store.remove_documentation(guide.id);
    harness.ledger.add_trigger(guide.id).await;
    let report = harness.scheduler.drain_once().await.expect("drain");

    assert_eq!(report.succeeded, 1);
    assert!(!site.exists());
    let statuses = harness
        .ledger
        .last_status_per_documentation()
        .await
        .expect("status");
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].status, BuildStatus::Succeeded);
}

#[tokio::test]
async fn exhausted_build_marks_triggers_failed() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::with_toolchain(
        data.path(),
        FakeToolchain::failing_builds(3),
        Duration::from_secs(5),
    );
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness.ledger.add_trigger(guide.id).await;

    let report = harness.scheduler.drain_once().await.expect("drain");
    assert_eq!(report.failed, 1);
    assert_eq!(harness.toolchain.count(ToolStep::Build), 3);

    let rows = harness.store.triggers();
    assert_eq!(rows[0].status, BuildStatus::Failed);
    assert!(rows[0].triggered);
    let message = rows[0].last_error.as_deref().expect("last_error");
    assert!(message.contains("build failed after 3 attempt(s)"));
    assert!(message.contains("build exploded"));

    // No retry until something triggers again.
    let again = harness.scheduler.drain_once().await.expect("drain");
    assert_eq!(again.passes, 0);
}

#[tokio::test]
async fn transient_build_failure_is_retried_within_the_pass() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::with_toolchain(
        data.path(),
        FakeToolchain::failing_builds(2),
        Duration::from_secs(5),
    );
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());

    let outcome = harness.pipeline.run_pass(guide.id).await.expect("pass");
    assert!(matches!(outcome, PassOutcome::Built { installed: true, .. }));
    assert_eq!(harness.toolchain.count(ToolStep::Build), 3);
}

#[tokio::test]
async fn second_pass_skips_install_when_dependencies_exist() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());

    harness.pipeline.run_pass(guide.id).await.expect("first");
    let second = harness.pipeline.run_pass(guide.id).await.expect("second");

    assert!(matches!(second, PassOutcome::Built { installed: false, .. }));
    assert_eq!(harness.toolchain.count(ToolStep::Install), 1);
    assert_eq!(harness.toolchain.count(ToolStep::Build), 2);
}

#[tokio::test]
async fn startup_reconciliation_scaffolds_and_queues_every_root() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    let manual = documentation("Manual", "3.1", "manual", 1);
    harness.store.add_documentation(guide.clone());
    harness.store.add_documentation(manual.clone());

    let summary = harness
        .scheduler
        .reconcile_on_startup()
        .await
        .expect("reconcile");
    assert_eq!(summary.documentations, 2);
    assert_eq!(summary.failed, 0);

    for root in [&guide, &manual] {
        let site = harness.materializer.site_root(root.id);
        assert!(site.join("package.json").exists());
        assert!(site.join("node_modules").exists());
    }
    assert_eq!(harness.toolchain.count(ToolStep::Install), 2);

    let pending = harness.ledger.drain_pending().await.expect("pending");
    assert_eq!(pending.len(), 2);

    // A second reconcile finds everything in place.
    let report = harness.pipeline.reconcile(&guide).await.expect("reconcile");
    assert!(!report.scaffolded);
    assert!(!report.installed);
}

#[tokio::test]
async fn build_now_settles_pending_triggers_of_that_documentation() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    let manual = documentation("Manual", "1.0", "manual", 1);
    harness.store.add_documentation(guide.clone());
    harness.store.add_documentation(manual.clone());
    harness.ledger.add_trigger(guide.id).await;
    harness.ledger.add_trigger(manual.id).await;

    let outcome = harness.scheduler.build_now(guide.id).await.expect("build");
    assert_eq!(outcome, BuildOutcome::Succeeded);

    let pending = harness.ledger.drain_pending().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert!(pending.contains_key(&manual.id));
}

#[tokio::test]
async fn deleted_version_is_pruned_from_the_lineage_site() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());
    harness
        .store
        .add_page(page(guide.id, None, "Intro", Some(0), true));

    let service = StructureService::new(harness.repositories(), harness.ledger.clone());
    let fork = service
        .create_version(guide.id, "2.0")
        .await
        .expect("create version");
    harness.scheduler.drain_once().await.expect("drain");

    let site = harness.materializer.site_root(guide.id);
    assert!(site.join("docs/2.0/guide/index.mdx").exists());
    let manifest = harness.materializer.manifest(guide.id).await.expect("manifest");
    assert_eq!(manifest.latest, "2.0");
    assert_eq!(
        harness.materializer.published_root(fork.id).await,
        Some(guide.id)
    );

    harness.store.remove_documentation(fork.id);
    harness.ledger.add_trigger(fork.id).await;
    let report = harness.scheduler.drain_once().await.expect("drain");

    assert_eq!(report.succeeded, 1);
    assert!(!site.join("docs/2.0").exists());
    assert!(site.join("docs/1.0/guide/index.mdx").exists());
    assert!(site.join("build/index.html").exists());
    assert_eq!(harness.toolchain.count(ToolStep::Build), 2);

    let manifest = harness.materializer.manifest(guide.id).await.expect("manifest");
    assert_eq!(manifest.latest, "1.0");
    assert_eq!(manifest.versions.len(), 1);
    let config = std::fs::read_to_string(site.join("rspress.config.ts")).expect("config");
    assert!(config.contains(r#"versions: ["1.0"]"#));
}

#[tokio::test]
async fn clone_reusing_a_label_reports_the_shadowed_version() {
    let data = TempDir::new().expect("temp dir");
    let harness = Harness::new(data.path());
    let guide = documentation("Guide", "1.0", "guide", 0);
    harness.store.add_documentation(guide.clone());

    let first = DocumentationRecord {
        cloned_from: Some(guide.id),
        ..documentation("Guide", "2.0", "guide", 10)
    };
    let second = DocumentationRecord {
        cloned_from: Some(guide.id),
        ..documentation("Guide", "2.0", "guide", 20)
    };
    harness.store.add_documentation(first.clone());
    harness.store.add_documentation(second.clone());

    let report = written(harness.materializer.materialize(guide.id).await.expect("materialize"));
    assert_eq!(report.versions, vec!["1.0".to_string(), "2.0".to_string()]);
    assert_eq!(report.shadowed.len(), 1);
    assert_eq!(report.shadowed[0].label, "2.0");
    assert_eq!(report.shadowed[0].documentation_id, first.id);
    assert_eq!(report.shadowed[0].replaced_by, second.id);

    let manifest = read_json(&report.site_root.join("docsmith.versions.json"));
    assert_eq!(manifest["shadowed"][0]["documentation_id"], first.id.to_string());
    assert_eq!(manifest["versions"][1]["documentation_id"], second.id.to_string());
}
