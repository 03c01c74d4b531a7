#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docsmith::application::ledger::TriggerLedger;
use docsmith::application::locks::BuildLockRegistry;
use docsmith::application::materialize::Materializer;
use docsmith::application::pipeline::SitePipeline;
use docsmith::application::repos::{
    DocumentationRepo, MarkProcessedParams, PageGroupsRepo, PagesRepo, RepoError, Repositories,
    StructureWriteRepo, TriggersRepo,
};
use docsmith::application::scheduler::Scheduler;
use docsmith::application::toolchain::{
    BuildInvoker, InvokerSettings, SiteToolchain, ToolOutput, ToolStep,
};
use docsmith::domain::entities::{
    BuildTriggerRecord, DocumentationRecord, PageGroupRecord, PageRecord,
};
use docsmith::domain::tree::VersionFork;
use docsmith::domain::types::BuildStatus;
use docsmith::infra::templates::TemplateBundle;
use time::{Duration as TimeDuration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

pub const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

pub fn at(minutes: i64) -> OffsetDateTime {
    EPOCH + TimeDuration::minutes(minutes)
}

#[derive(Default)]
struct State {
    documentations: Vec<DocumentationRecord>,
    groups: Vec<PageGroupRecord>,
    pages: Vec<PageRecord>,
    triggers: Vec<BuildTriggerRecord>,
}

/// In-memory stand-in for every repository role.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_documentation(&self, record: DocumentationRecord) {
        self.state
            .lock()
            .expect("state")
            .documentations
            .push(record);
    }

    pub fn remove_documentation(&self, id: Uuid) {
        let mut state = self.state.lock().expect("state");
        state.documentations.retain(|doc| doc.id != id);
        state.groups.retain(|group| group.documentation_id != id);
        state.pages.retain(|page| page.documentation_id != id);
    }

    pub fn add_group(&self, record: PageGroupRecord) {
        self.state.lock().expect("state").groups.push(record);
    }

    pub fn add_page(&self, record: PageRecord) {
        self.state.lock().expect("state").pages.push(record);
    }

    pub fn update_page_content(&self, id: Uuid, content: &str) {
        let mut state = self.state.lock().expect("state");
        if let Some(page) = state.pages.iter_mut().find(|page| page.id == id) {
            page.content = content.to_string();
        }
    }

    pub fn groups_of(&self, documentation_id: Uuid) -> Vec<PageGroupRecord> {
        self.state
            .lock()
            .expect("state")
            .groups
            .iter()
            .filter(|group| group.documentation_id == documentation_id)
            .cloned()
            .collect()
    }

    pub fn pages_of(&self, documentation_id: Uuid) -> Vec<PageRecord> {
        self.state
            .lock()
            .expect("state")
            .pages
            .iter()
            .filter(|page| page.documentation_id == documentation_id)
            .cloned()
            .collect()
    }

    pub fn triggers(&self) -> Vec<BuildTriggerRecord> {
        self.state.lock().expect("state").triggers.clone()
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories::from_shared(Arc::clone(self))
    }
}

#[async_trait]
impl DocumentationRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentationRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        Ok(state.documentations.iter().find(|doc| doc.id == id).cloned())
    }

    async fn list_lineage_roots(&self) -> Result<Vec<DocumentationRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        let mut roots: Vec<_> = state
            .documentations
            .iter()
            .filter(|doc| doc.cloned_from.is_none())
            .cloned()
            .collect();
        roots.sort_by_key(|doc| doc.created_at);
        Ok(roots)
    }

    async fn list_cloned_from(&self, id: Uuid) -> Result<Vec<DocumentationRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        let mut clones: Vec<_> = state
            .documentations
            .iter()
            .filter(|doc| doc.cloned_from == Some(id))
            .cloned()
            .collect();
        clones.sort_by_key(|doc| doc.created_at);
        Ok(clones)
    }
}

#[async_trait]
impl PageGroupsRepo for MemoryStore {
    async fn find_group(&self, id: Uuid) -> Result<Option<PageGroupRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        Ok(state.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageGroupRecord>, RepoError> {
        Ok(self.groups_of(documentation_id))
    }
}

#[async_trait]
impl PagesRepo for MemoryStore {
    async fn list_pages_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageRecord>, RepoError> {
        Ok(self.pages_of(documentation_id))
    }
}

#[async_trait]
impl TriggersRepo for MemoryStore {
    async fn insert_trigger(
        &self,
        documentation_id: Uuid,
        created_at: OffsetDateTime,
    ) -> Result<BuildTriggerRecord, RepoError> {
        let record = BuildTriggerRecord {
            id: Uuid::new_v4(),
            documentation_id,
            triggered: false,
            status: BuildStatus::Pending,
            last_error: None,
            created_at: Some(created_at),
            completed_at: None,
        };
        self.state
            .lock()
            .expect("state")
            .triggers
            .push(record.clone());
        Ok(record)
    }

    async fn list_pending(&self) -> Result<Vec<BuildTriggerRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        Ok(state
            .triggers
            .iter()
            .filter(|row| !row.triggered)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, params: MarkProcessedParams) -> Result<u64, RepoError> {
        let mut state = self.state.lock().expect("state");
        let mut updated = 0;
        for row in state
            .triggers
            .iter_mut()
            .filter(|row| !row.triggered && params.ids.contains(&row.id))
        {
            row.triggered = true;
            row.status = params.status;
            row.last_error = params.last_error.clone();
            row.completed_at = Some(params.completed_at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn latest_per_documentation(&self) -> Result<Vec<BuildTriggerRecord>, RepoError> {
        let state = self.state.lock().expect("state");
        Ok(docsmith::application::ledger::select_latest(&state.triggers))
    }
}

#[async_trait]
impl StructureWriteRepo for MemoryStore {
    async fn update_group_parent(
        &self,
        group_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<PageGroupRecord, RepoError> {
        let mut state = self.state.lock().expect("state");
        let group = state
            .groups
            .iter_mut()
            .find(|group| group.id == group_id)
            .ok_or(RepoError::NotFound)?;
        group.parent_id = parent_id;
        Ok(group.clone())
    }

    async fn insert_version(&self, fork: VersionFork) -> Result<DocumentationRecord, RepoError> {
        let mut state = self.state.lock().expect("state");
        let created = fork.documentation.clone();
        state.documentations.push(fork.documentation);
        state.groups.extend(fork.groups);
        state.pages.extend(fork.pages);
        Ok(created)
    }
}

pub fn documentation(name: &str, version: &str, base_url: &str, minute: i64) -> DocumentationRecord {
    DocumentationRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        version: version.to_string(),
        base_url: base_url.to_string(),
        cloned_from: None,
        primary_color: None,
        logo_url: None,
        favicon_url: None,
        custom_css: None,
        lander: None,
        created_at: at(minute),
        updated_at: at(minute),
    }
}

pub fn group(
    documentation_id: Uuid,
    parent_id: Option<Uuid>,
    name: &str,
    order: Option<i32>,
) -> PageGroupRecord {
    PageGroupRecord {
        id: Uuid::new_v4(),
        documentation_id,
        parent_id,
        name: name.to_string(),
        order,
        created_at: EPOCH,
    }
}

pub fn page(
    documentation_id: Uuid,
    page_group_id: Option<Uuid>,
    title: &str,
    order: Option<i32>,
    is_intro_page: bool,
) -> PageRecord {
    PageRecord {
        id: Uuid::new_v4(),
        documentation_id,
        page_group_id,
        title: title.to_string(),
        slug: title.to_lowercase(),
        content: paragraph(title),
        order,
        is_intro_page,
        created_at: EPOCH,
    }
}

/// A one-paragraph content forest.
pub fn paragraph(text: &str) -> String {
    serde_json::json!([
        {
            "type": "paragraph",
            "content": [{ "type": "text", "text": text, "styles": {} }],
            "children": []
        }
    ])
    .to_string()
}

/// Toolchain that creates the directories a real install and build would,
/// failing the first `fail_builds` build attempts.
#[derive(Default)]
pub struct FakeToolchain {
    calls: Mutex<Vec<ToolStep>>,
    fail_builds: Mutex<u32>,
    build_delay: Option<Duration>,
}

impl FakeToolchain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            build_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn failing_builds(count: u32) -> Arc<Self> {
        Arc::new(Self {
            fail_builds: Mutex::new(count),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<ToolStep> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, step: ToolStep) -> usize {
        self.calls().into_iter().filter(|call| *call == step).count()
    }
}

#[async_trait]
impl SiteToolchain for FakeToolchain {
    async fn run(&self, step: ToolStep, site_root: &Path) -> io::Result<ToolOutput> {
        self.calls.lock().expect("calls").push(step);
        let defaults = InvokerSettings::default();

        match step {
            ToolStep::Install => {
                tokio::fs::create_dir_all(site_root.join(&defaults.dependency_dir)).await?;
            }
            ToolStep::Build => {
                if let Some(delay) = self.build_delay {
                    tokio::time::sleep(delay).await;
                }
                let should_fail = {
                    let mut remaining = self.fail_builds.lock().expect("fail_builds");
                    if *remaining > 0 {
                        *remaining -= 1;
                        true
                    } else {
                        false
                    }
                };
                if should_fail {
                    return Ok(ToolOutput {
                        success: false,
                        exit_code: Some(1),
                        stdout: String::new(),
                        stderr: "build exploded".to_string(),
                    });
                }
                let output = site_root.join(&defaults.output_dir);
                tokio::fs::create_dir_all(&output).await?;
                tokio::fs::write(output.join("index.html"), "<html></html>").await?;
            }
        }

        Ok(ToolOutput {
            success: true,
            exit_code: Some(0),
            stdout: "ok".to_string(),
            stderr: String::new(),
        })
    }
}

/// A full scheduler over a memory store, a fake toolchain and `data_root`.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub toolchain: Arc<FakeToolchain>,
    pub materializer: Materializer,
    pub pipeline: Arc<SitePipeline>,
    pub scheduler: Scheduler,
    pub ledger: TriggerLedger,
}

impl Harness {
    pub fn new(data_root: &Path) -> Self {
        Self::with_toolchain(data_root, FakeToolchain::new(), Duration::from_secs(5))
    }

    pub fn with_toolchain(
        data_root: &Path,
        toolchain: Arc<FakeToolchain>,
        lock_timeout: Duration,
    ) -> Self {
        let store = MemoryStore::new();
        let repositories = store.repositories();
        let ledger = TriggerLedger::new(repositories.triggers.clone());
        let materializer = Materializer::new(
            data_root,
            repositories.clone(),
            Arc::new(TemplateBundle::embedded()),
        );
        let invoker = BuildInvoker::new(toolchain.clone(), InvokerSettings::default());
        let locks = BuildLockRegistry::new(lock_timeout);
        let pipeline = Arc::new(SitePipeline::new(
            materializer.clone(),
            invoker,
            locks.clone(),
        ));
        let scheduler = Scheduler::new(
            ledger.clone(),
            repositories.documentations.clone(),
            pipeline.clone(),
        )
        .with_lock_registry(locks);

        Self {
            store,
            toolchain,
            materializer,
            pipeline,
            scheduler,
            ledger,
        }
    }

    pub fn repositories(&self) -> Repositories {
        self.store.repositories()
    }
}

/// Relative path → contents for every file under `root`.
pub fn snapshot_tree(root: &Path) -> HashMap<String, String> {
    let mut files = HashMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(contents) = std::fs::read_to_string(&path) {
                let relative = path
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/");
                files.insert(relative, contents);
            }
        }
    }
    files
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
    serde_json::from_str(&text).expect("valid json")
}
