//! In-memory collaborators for tests

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::changeset::{ChangeStatus, FileChange};
use crate::hosting::{HostingClient, RepositoryKind, ReviewRequest};
use crate::job::{normalize_analysis_name, Job, JobId, JobStatus, JobStore};
use crate::llm::{LlmProvider, LlmRequest, LlmResponse, ProviderKind};
use crate::report::{BlobStorage, ReportKey};
use crate::{Error, Result};

/// Job store backed by a map, recording every status it was written with
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    names: Mutex<HashMap<String, JobId>>,
    history: Mutex<Vec<JobStatus>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses in the order they were persisted
    pub fn history(&self) -> Vec<JobStatus> {
        self.history.lock().unwrap().clone()
    }

    pub fn stored(&self, id: &JobId) -> Job {
        self.jobs.lock().unwrap().get(id).cloned().unwrap()
    }

    /// Overwrite a record without touching the history
    pub fn restore(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn set(&self, job: &Job, _ttl: Duration) -> Result<()> {
        let mut history = self.history.lock().unwrap();
        if history.last() != Some(&job.status) {
            history.push(job.status.clone());
        }
        self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn index_analysis_name(&self, name: &str, id: &JobId) -> Result<()> {
        self.names
            .lock()
            .unwrap()
            .insert(normalize_analysis_name(name), id.clone());
        Ok(())
    }

    async fn find_by_analysis_name(&self, name: &str) -> Result<Option<JobId>> {
        Ok(self
            .names
            .lock()
            .unwrap()
            .get(&normalize_analysis_name(name))
            .cloned())
    }
}

/// LLM provider replaying queued responses and recording requests
pub struct ScriptedLlm {
    kind: ProviderKind,
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue a response
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(text.into());
        self
    }

    /// Queue a response on a shared provider
    pub fn push(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(text.into());
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn run(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Llm("no scripted response left".to_string()))?;
        Ok(LlmResponse {
            tokens_in: request.prompt.len() as u64,
            tokens_out: text.len() as u64,
            text,
        })
    }
}

/// Hosting provider keeping branches as in-memory file maps
pub struct FakeHosting {
    kind: RepositoryKind,
    default_branch: String,
    branches: Mutex<HashMap<String, BTreeMap<String, String>>>,
    reviews: Mutex<Vec<ReviewRequest>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeHosting {
    pub fn new(kind: RepositoryKind) -> Self {
        Self {
            kind,
            default_branch: "main".to_string(),
            branches: Mutex::new(HashMap::new()),
            reviews: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn put_file(&self, branch: &str, path: &str, content: &str) {
        self.branches
            .lock()
            .unwrap()
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.branches
            .lock()
            .unwrap()
            .get(branch)
            .and_then(|files| files.get(path).cloned())
    }

    pub fn reviews(&self) -> Vec<ReviewRequest> {
        self.reviews.lock().unwrap().clone()
    }

    /// Make every write to `branch` fail
    pub fn fail_branch(&self, branch: &str) {
        self.failing.lock().unwrap().insert(branch.to_string());
    }

    fn check_writable(&self, branch: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(branch) {
            return Err(Error::Hosting(format!("branch {} rejected the write", branch)));
        }
        Ok(())
    }
}

#[async_trait]
impl HostingClient for FakeHosting {
    fn kind(&self) -> RepositoryKind {
        self.kind
    }

    async fn default_branch(&self, _repository: &str) -> Result<String> {
        Ok(self.default_branch.clone())
    }

    async fn list_files(&self, _repository: &str, branch: &str) -> Result<Vec<String>> {
        self.branches
            .lock()
            .unwrap()
            .get(branch)
            .map(|files| files.keys().cloned().collect())
            .ok_or_else(|| Error::Hosting(format!("branch {} not found", branch)))
    }

    async fn read_file(&self, _repository: &str, branch: &str, path: &str) -> Result<Option<String>> {
        Ok(self.file(branch, path))
    }

    async fn branch_exists(&self, _repository: &str, branch: &str) -> Result<bool> {
        Ok(self.branches.lock().unwrap().contains_key(branch))
    }

    async fn create_branch(&self, _repository: &str, branch: &str, from: &str) -> Result<()> {
        self.check_writable(branch)?;
        let mut branches = self.branches.lock().unwrap();
        let files = branches
            .get(from)
            .cloned()
            .ok_or_else(|| Error::Hosting(format!("branch {} not found", from)))?;
        branches.insert(branch.to_string(), files);
        Ok(())
    }

    async fn commit_changes(
        &self,
        _repository: &str,
        branch: &str,
        _message: &str,
        changes: &[FileChange],
    ) -> Result<usize> {
        self.check_writable(branch)?;
        let mut branches = self.branches.lock().unwrap();
        let files = branches.entry(branch.to_string()).or_default();
        for change in changes {
            match (change.status, &change.content) {
                (ChangeStatus::Removed, _) => {
                    files.remove(&change.path);
                }
                (_, Some(content)) => {
                    files.insert(change.path.clone(), content.clone());
                }
                (_, None) => {}
            }
        }
        Ok(changes.len())
    }

    async fn open_review(&self, repository: &str, review: &ReviewRequest) -> Result<String> {
        let mut reviews = self.reviews.lock().unwrap();
        reviews.push(review.clone());
        Ok(format!("https://hosting.test/{}/pull/{}", repository, reviews.len()))
    }
}

/// Report storage in memory, optionally failing every read
#[derive(Default)]
pub struct MemoryReports {
    reports: Mutex<HashMap<ReportKey, String>>,
    fail_reads: bool,
}

impl MemoryReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: ReportKey, text: &str) {
        self.reports.lock().unwrap().insert(key, text.to_string());
    }

    pub fn get(&self, key: &ReportKey) -> Option<String> {
        self.reports.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStorage for MemoryReports {
    async fn read(&self, key: &ReportKey) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(Error::Storage("report storage unavailable".to_string()));
        }
        Ok(self.get(key))
    }

    async fn write(&self, key: &ReportKey, text: &str) -> Result<String> {
        self.insert(key.clone(), text);
        Ok(format!("memory://{}", key.relative_path().display()))
    }
}

pub const TEST_CATALOG: &str = r#"
extensions:
  relatorio: [".py"]
  relatorio_aprovado: [".py"]
  dois_passos: [".py"]
  refatoracao: [".py"]
  quebrado: [".py"]
workflows:
  relatorio:
    steps:
      - agent_type: revisor
        status_update: analyzing
  relatorio_aprovado:
    steps:
      - agent_type: revisor
        status_update: analyzing
        requires_approval: true
      - agent_type: processador
        status_update: processing
  dois_passos:
    steps:
      - agent_type: revisor
        status_update: analyzing
      - agent_type: processador
        status_update: processing
        model_name: claude-sonnet-4-5
  refatoracao:
    steps:
      - agent_type: revisor
        status_update: analyzing
      - agent_type: processador
        status_update: refactoring
      - agent_type: processador
        status_update: grouping
  quebrado:
    steps:
      - agent_type: executor
        status_update: running
"#;

/// An orchestrator wired to in-memory collaborators
pub struct Harness {
    pub orchestrator: crate::workflow::Orchestrator,
    pub store: std::sync::Arc<MemoryJobStore>,
    pub openai: std::sync::Arc<ScriptedLlm>,
    pub claude: std::sync::Arc<ScriptedLlm>,
    pub hosting: std::sync::Arc<FakeHosting>,
    pub reports: std::sync::Arc<MemoryReports>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ScriptedLlm::new(ProviderKind::OpenAi), MemoryReports::new(), None)
    }

    pub fn build(openai: ScriptedLlm, reports: MemoryReports, step_timeout: Option<Duration>) -> Self {
        use crate::hosting::HostingRegistry;
        use crate::llm::ProviderRegistry;
        use crate::workflow::{Orchestrator, OrchestratorSettings, WorkflowCatalog};
        use std::sync::Arc;

        let store = Arc::new(MemoryJobStore::new());
        let openai = Arc::new(openai);
        let claude = Arc::new(ScriptedLlm::new(ProviderKind::Claude));
        let hosting = Arc::new(FakeHosting::new(RepositoryKind::Github));
        hosting.put_file("main", "app.py", "print('old')");
        hosting.put_file("main", "util.py", "x = 1");
        let reports = Arc::new(reports);

        let catalog = WorkflowCatalog::from_yaml_str(TEST_CATALOG).unwrap();
        let settings = OrchestratorSettings {
            step_timeout,
            ..OrchestratorSettings::default()
        };
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(catalog),
            HostingRegistry::new().with(hosting.clone()),
            ProviderRegistry::new()
                .with(openai.clone())
                .with(claude.clone()),
            reports.clone(),
            settings,
        );

        Self {
            orchestrator,
            store,
            openai,
            claude,
            hosting,
            reports,
        }
    }

    pub fn request(workflow: &str) -> crate::job::JobRequest {
        crate::job::JobRequest {
            repository: "acme/api".to_string(),
            repository_kind: RepositoryKind::Github,
            analysis_type: workflow.to_string(),
            ..Default::default()
        }
    }

    pub async fn submit(&self, request: crate::job::JobRequest) -> JobId {
        self.orchestrator.submit(request).await.unwrap()
    }

    pub fn job(&self, id: &JobId) -> Job {
        self.store.stored(id)
    }
}
