//! Shared fakes for branchwright integration tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use semver::Version;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use branchwright::git::{GitOps, PullOptions, Remote, StatusReport, CONTROL_DIR};
use branchwright::project::MANIFEST_FILE;
use branchwright::provider::{HostingProvider, Organization, Repository, User};
use branchwright::store::{OwnerMode, ProviderConfig};
use branchwright::version::Increment;
use branchwright::{Config, ConfigStore, ProviderConnector, ProviderKind, Prompter, Publisher};

/// Project directory and credential store living in temp directories
pub struct TestEnvironment {
    pub project_dir: TempDir,
    pub home_dir: TempDir,
}

impl TestEnvironment {
    pub fn new(version: &str) -> Self {
        let project_dir = TempDir::new().expect("Failed to create temp dir");
        let home_dir = TempDir::new().expect("Failed to create temp dir");

        let manifest = format!(
            concat!(
                "{{\n  \"name\": \"demo\",\n  \"version\": \"{}\",\n",
                "  \"scripts\": {{\n    \"build\": \"vite build\"\n  }}\n}}\n",
            ),
            version
        );
        std::fs::write(project_dir.path().join(MANIFEST_FILE), manifest)
            .expect("Failed to write manifest");

        Self {
            project_dir,
            home_dir,
        }
    }

    pub fn project_path(&self) -> &Path {
        self.project_dir.path()
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.home_dir.path().join("git"))
    }

    pub fn manifest(&self) -> String {
        std::fs::read_to_string(self.project_path().join(MANIFEST_FILE))
            .expect("Failed to read manifest")
    }

    pub fn publisher(
        &self,
        provider: &FakeProvider,
        git: &Arc<FakeGit>,
        prompter: &Arc<ScriptedPrompter>,
    ) -> Publisher {
        Publisher::new(
            Arc::new(Config::default()),
            self.store(),
            Arc::new(FakeConnector::new(provider.clone())),
            git.clone(),
            prompter.clone(),
        )
    }
}

/// In-memory stand-in for a git repository and its `origin`
#[derive(Debug, Default)]
pub struct GitState {
    pub calls: Vec<String>,
    pub current_branch: String,
    pub local_branches: Vec<String>,
    pub remotes: Vec<Remote>,
    pub remote_refs: Vec<String>,
    pub status: StatusReport,
    pub stash: Vec<String>,
    pub fail_pull: bool,
    pub fail_push: bool,
}

pub struct FakeGit {
    dir: PathBuf,
    pub state: Mutex<GitState>,
}

impl FakeGit {
    pub fn new(dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            state: Mutex::new(GitState::default()),
        })
    }

    pub fn with_state(&self, update: impl FnOnce(&mut GitState)) {
        update(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) -> std::sync::MutexGuard<'_, GitState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl GitOps for FakeGit {
    async fn init(&self, initial_branch: &str) -> Result<()> {
        let mut state = self.record(format!("init {}", initial_branch));
        std::fs::create_dir_all(self.dir.join(CONTROL_DIR))?;
        state.current_branch = initial_branch.to_string();
        Ok(())
    }

    async fn add(&self, paths: &[String]) -> Result<()> {
        self.record(format!("add {}", paths.join(" ")));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        let mut state = self.record(format!("commit {}", message));
        state.status = StatusReport::default();
        let current = state.current_branch.clone();
        if !state.local_branches.contains(&current) {
            state.local_branches.push(current);
        }
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        let mut state = self.record(format!("push {} {}", remote, branch));
        if state.fail_push {
            return Err(anyhow!("fatal: Could not read from remote repository."));
        }
        let head = format!("refs/heads/{}", branch);
        if !state.remote_refs.contains(&head) {
            state.remote_refs.push(head);
        }
        Ok(())
    }

    async fn pull(&self, remote: &str, branch: &str, options: PullOptions) -> Result<()> {
        let suffix = if options.allow_unrelated_histories {
            " --allow-unrelated-histories"
        } else {
            ""
        };
        let state = self.record(format!("pull {} {}{}", remote, branch, suffix));
        if state.fail_pull {
            return Err(anyhow!("fatal: unable to access remote"));
        }
        Ok(())
    }

    async fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().local_branches.clone())
    }

    async fn list_remote_refs(&self, _remote: &str) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().remote_refs.clone())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.record(format!("checkout {}", branch));
        state.current_branch = branch.to_string();
        Ok(())
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        let mut state = self.record(format!("checkout -b {}", branch));
        state.local_branches.push(branch.to_string());
        state.current_branch = branch.to_string();
        Ok(())
    }

    async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut state = self.record(format!("remote add {} {}", name, url));
        state.remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn remotes(&self) -> Result<Vec<Remote>> {
        Ok(self.state.lock().unwrap().remotes.clone())
    }

    async fn stash_list(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().stash.clone())
    }

    async fn stash_pop(&self) -> Result<()> {
        let mut state = self.record("stash pop".to_string());
        if state.stash.is_empty() {
            return Err(anyhow!("No stash entries found."));
        }
        state.stash.remove(0);
        Ok(())
    }

    async fn status(&self) -> Result<StatusReport> {
        Ok(self.state.lock().unwrap().status.clone())
    }
}

#[derive(Debug, Default)]
pub struct ProviderState {
    pub user: String,
    pub orgs: Vec<String>,
    /// `login/name` of every repository that exists
    pub repositories: Vec<String>,
    pub created: Vec<String>,
}

/// Hosting provider backed by shared in-memory state
#[derive(Clone, Default)]
pub struct FakeProvider {
    pub state: Arc<Mutex<ProviderState>>,
}

impl FakeProvider {
    pub fn new(user: &str, orgs: &[&str]) -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state.lock().unwrap();
            state.user = user.to_string();
            state.orgs = orgs.iter().map(|o| o.to_string()).collect();
        }
        provider
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    fn create(&self, login: &str, name: &str) -> Repository {
        let full_name = format!("{}/{}", login, name);
        let mut state = self.state.lock().unwrap();
        state.repositories.push(full_name.clone());
        state.created.push(full_name.clone());
        Repository {
            name: name.to_string(),
            full_name: Some(full_name),
            html_url: None,
        }
    }
}

#[async_trait]
impl HostingProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn get_user(&self) -> Result<User, branchwright::RemoteError> {
        Ok(User {
            login: self.state.lock().unwrap().user.clone(),
        })
    }

    async fn get_organizations(
        &self,
        _login: &str,
    ) -> Result<Vec<Organization>, branchwright::RemoteError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orgs
            .iter()
            .map(|login| Organization {
                login: login.clone(),
            })
            .collect())
    }

    async fn get_repository(
        &self,
        login: &str,
        name: &str,
    ) -> Result<Option<Repository>, branchwright::RemoteError> {
        let full_name = format!("{}/{}", login, name);
        let exists = self.state.lock().unwrap().repositories.contains(&full_name);
        Ok(exists.then(|| Repository {
            name: name.to_string(),
            full_name: Some(full_name),
            html_url: None,
        }))
    }

    async fn create_personal_repository(
        &self,
        name: &str,
    ) -> Result<Repository, branchwright::RemoteError> {
        let user = self.state.lock().unwrap().user.clone();
        Ok(self.create(&user, name))
    }

    async fn create_organization_repository(
        &self,
        name: &str,
        org: &str,
    ) -> Result<Repository, branchwright::RemoteError> {
        Ok(self.create(org, name))
    }

    fn clone_url(&self, login: &str, name: &str) -> String {
        format!("git@git.test:{}/{}.git", login, name)
    }
}

pub struct FakeConnector {
    provider: FakeProvider,
}

impl FakeConnector {
    pub fn new(provider: FakeProvider) -> Self {
        Self { provider }
    }
}

impl ProviderConnector for FakeConnector {
    fn connect(&self, _config: &ProviderConfig) -> Result<Box<dyn HostingProvider>> {
        Ok(Box::new(self.provider.clone()))
    }
}

/// Answers prompts from a script and records what was asked
pub struct ScriptedPrompter {
    pub provider: ProviderKind,
    pub token: String,
    pub mode: OwnerMode,
    pub org: String,
    pub increment: Increment,
    messages: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<&'static str>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self {
            provider: ProviderKind::GitHub,
            token: "ghp_test".to_string(),
            mode: OwnerMode::Personal,
            org: String::new(),
            increment: Increment::Patch,
            messages: Mutex::new(VecDeque::new()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn with_messages(self, messages: &[&str]) -> Self {
        *self.messages.lock().unwrap() = messages.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn asked(&self) -> Vec<&'static str> {
        self.asked.lock().unwrap().clone()
    }

    fn ask(&self, what: &'static str) {
        self.asked.lock().unwrap().push(what);
    }
}

impl Prompter for ScriptedPrompter {
    fn select_provider(&self) -> Result<ProviderKind> {
        self.ask("provider");
        Ok(self.provider)
    }

    fn input_token(&self, _kind: ProviderKind) -> Result<String> {
        self.ask("token");
        Ok(self.token.clone())
    }

    fn select_owner_mode(&self, _allow_organization: bool) -> Result<OwnerMode> {
        self.ask("owner");
        Ok(self.mode)
    }

    fn select_organization(&self, _orgs: &[Organization]) -> Result<String> {
        self.ask("org");
        Ok(self.org.clone())
    }

    fn select_increment(&self, _latest_release: &Version) -> Result<Increment> {
        self.ask("increment");
        Ok(self.increment)
    }

    fn input_commit_message(&self) -> Result<String> {
        self.ask("message");
        Ok(self
            .messages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "publish".to_string()))
    }
}

pub fn untracked(paths: &[&str]) -> StatusReport {
    StatusReport {
        not_added: paths.iter().map(|p| p.to_string()).collect(),
        ..Default::default()
    }
}
