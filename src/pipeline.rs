//! Publish pipeline
//!
//! [`Publisher::run`] sequences credential resolution, remote repository
//! setup, linking and the commit cycle as explicit steps. Each step hands its
//! result to a [`StepLog`] which applies one policy to every failure:
//! fatal errors abort, recoverable ones are logged and recorded, expected ones
//! are recorded as skipped.

use anyhow::{anyhow, Context, Result};
use semver::Version;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PublishError, Severity};
use crate::git::GitOps;
use crate::ignore::ensure_ignore_file;
use crate::project::ProjectRef;
use crate::prompt::Prompter;
use crate::provider::{HostingProvider, Organization, ProviderConnector, Repository, User};
use crate::store::{self, ConfigStore, OwnerMode, OwnershipConfig};
use crate::sync::Synchronizer;
use crate::version;

/// Result of a step that ran without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    Done(T),
    /// The step had nothing to do
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Skipped(String),
    /// Failed with a recoverable error; the run continued
    Recovered(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: &'static str,
    pub status: StepStatus,
}

/// Flags that force a stored choice to be asked again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub refresh_server: bool,
    pub refresh_token: bool,
    pub refresh_owner: bool,
}

/// Remote repository the project publishes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepoRef {
    pub login: String,
    pub name: String,
    pub clone_url: String,
    /// Whether it existed before this run
    pub exists: bool,
}

/// Summary of one publish run
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub project: String,
    pub remote: Option<RemoteRepoRef>,
    pub branch: Option<String>,
    pub version: Option<Version>,
    pub steps: Vec<StepRecord>,
    pub duration: Duration,
}

impl PublishReport {
    pub fn status_of(&self, name: &str) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|record| record.name == name)
            .map(|record| &record.status)
    }

    pub fn completed(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Skipped(_)))
    }

    pub fn recovered(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Recovered(_)))
    }

    fn count(&self, predicate: impl Fn(&StepStatus) -> bool) -> usize {
        self.steps.iter().filter(|record| predicate(&record.status)).count()
    }
}

/// Step names as they appear in the report
pub mod steps {
    pub const CREDENTIALS: &str = "credentials";
    pub const CONNECT: &str = "connect";
    pub const ACCOUNT: &str = "account";
    pub const OWNERSHIP: &str = "ownership";
    pub const REMOTE_REPOSITORY: &str = "remote repository";
    pub const IGNORE_FILE: &str = "ignore file";
    pub const LINK: &str = "link";
    pub const INITIAL_SYNC: &str = "initial sync";
    pub const REMOTE_REFS: &str = "remote refs";
    pub const BRANCH_PLAN: &str = "branch plan";
    pub const STASH: &str = "restore stash";
    pub const COMMIT: &str = "commit";
    pub const CHECKOUT: &str = "checkout";
    pub const MERGE_MASTER: &str = "merge master";
    pub const MERGE_DEV: &str = "merge dev branch";
    pub const PUSH: &str = "push";
}

/// Records step results and applies the severity policy
#[derive(Debug, Default)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step result; `Ok(None)` means the run continues without a value
    pub fn settle<T>(
        &mut self,
        name: &'static str,
        result: Result<StepOutcome<T>>,
    ) -> Result<Option<T>> {
        match result {
            Ok(StepOutcome::Done(value)) => {
                self.push(name, StepStatus::Completed);
                Ok(Some(value))
            }
            Ok(StepOutcome::Skipped(reason)) => {
                info!("Skipping {}: {}", name, reason);
                self.push(name, StepStatus::Skipped(reason));
                Ok(None)
            }
            Err(e) => match PublishError::severity_of(&e) {
                Severity::Fatal => {
                    error!("Step {} failed: {:#}", name, e);
                    Err(e)
                }
                Severity::Recoverable => {
                    warn!("Step {} failed, continuing: {:#}", name, e);
                    self.push(name, StepStatus::Recovered(e.to_string()));
                    Ok(None)
                }
                Severity::Expected => {
                    info!("Skipping {}: {}", name, e);
                    self.push(name, StepStatus::Skipped(e.to_string()));
                    Ok(None)
                }
            },
        }
    }

    /// Like [`StepLog::settle`] for steps whose value the rest of the run depends on
    pub fn require<T>(&mut self, name: &'static str, result: Result<StepOutcome<T>>) -> Result<T> {
        self.settle(name, result)?
            .ok_or_else(|| anyhow!("Step {} produced no result", name))
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }

    fn push(&mut self, name: &'static str, status: StepStatus) {
        self.records.push(StepRecord { name, status });
    }
}

/// Runs the publish workflow for one project
#[derive(Clone)]
pub struct Publisher {
    config: Arc<Config>,
    store: ConfigStore,
    connector: Arc<dyn ProviderConnector>,
    git: Arc<dyn GitOps>,
    prompter: Arc<dyn Prompter>,
}

impl Publisher {
    pub fn new(
        config: Arc<Config>,
        store: ConfigStore,
        connector: Arc<dyn ProviderConnector>,
        git: Arc<dyn GitOps>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            config,
            store,
            connector,
            git,
            prompter,
        }
    }

    pub async fn run(
        &self,
        mut project: ProjectRef,
        options: PublishOptions,
    ) -> Result<PublishReport> {
        let start_time = Instant::now();
        let mut log = StepLog::new();

        info!("Publishing {}@{}", project.name, project.version);

        let prompter = self.prompter.as_ref();
        let credentials = log.require(
            steps::CREDENTIALS,
            store::resolve_provider_config(
                &self.store,
                prompter,
                options.refresh_server,
                options.refresh_token,
            )
            .map(StepOutcome::Done),
        )?;

        let provider = log.require(
            steps::CONNECT,
            self.connector.connect(&credentials).map(StepOutcome::Done),
        )?;

        let (user, orgs) = log.require(steps::ACCOUNT, fetch_account(provider.as_ref()).await)?;

        let ownership = log.require(
            steps::OWNERSHIP,
            store::resolve_ownership(&self.store, prompter, &user, &orgs, options.refresh_owner)
                .map(StepOutcome::Done),
        )?;

        let remote = log.require(
            steps::REMOTE_REPOSITORY,
            resolve_remote(provider.as_ref(), &ownership, &project.name).await,
        )?;

        log.settle(steps::IGNORE_FILE, write_ignore_file(&project))?;

        let sync = Synchronizer::new(
            self.git.as_ref(),
            prompter,
            &project.directory,
            &self.config.publish,
        );

        let linked = log.settle(steps::LINK, sync.link(&remote.clone_url).await)?;
        log.settle(steps::INITIAL_SYNC, sync.initial_sync(linked.is_some()).await)?;

        let refs = log.require(
            steps::REMOTE_REFS,
            sync.remote_refs().await.map(StepOutcome::Done),
        )?;
        let plan = log.require(steps::BRANCH_PLAN, plan_branch(&mut project, &refs, prompter))?;

        log.settle(steps::STASH, sync.restore_stash().await)?;

        log.settle(steps::COMMIT, sync.commit_changes().await)?;

        log.settle(steps::CHECKOUT, sync.checkout_branch(&plan).await)?;
        log.settle(steps::MERGE_MASTER, sync.merge_master(&refs).await)?;
        log.settle(steps::MERGE_DEV, sync.merge_dev_branch(&plan, &refs).await)?;
        log.settle(steps::PUSH, sync.push_branch(&plan.branch_name).await)?;

        let report = PublishReport {
            project: project.name.clone(),
            remote: Some(remote),
            branch: Some(plan.branch_name),
            version: Some(plan.resolved_version),
            steps: log.into_records(),
            duration: start_time.elapsed(),
        };

        info!(
            "Publish finished in {:.2}s: {} completed, {} skipped, {} recovered",
            report.duration.as_secs_f64(),
            report.completed(),
            report.skipped(),
            report.recovered()
        );

        Ok(report)
    }
}

async fn fetch_account(
    provider: &dyn HostingProvider,
) -> Result<StepOutcome<(User, Vec<Organization>)>> {
    let user = provider.get_user().await.map_err(PublishError::from)?;
    let orgs = provider
        .get_organizations(&user.login)
        .await
        .map_err(PublishError::from)?;
    info!(
        "Signed in to {} as {} ({} organizations)",
        provider.kind(),
        user.login,
        orgs.len()
    );
    Ok(StepOutcome::Done((user, orgs)))
}

async fn find_remote(
    provider: &dyn HostingProvider,
    login: &str,
    name: &str,
) -> Result<Repository> {
    provider
        .get_repository(login, name)
        .await
        .map_err(PublishError::from)?
        .ok_or_else(|| {
            PublishError::RemoteNotFound {
                login: login.to_string(),
                name: name.to_string(),
            }
            .into()
        })
}

/// Look the repository up under the chosen owner, creating it when absent
async fn resolve_remote(
    provider: &dyn HostingProvider,
    ownership: &OwnershipConfig,
    name: &str,
) -> Result<StepOutcome<RemoteRepoRef>> {
    let login = ownership.login.as_str();

    let exists = match find_remote(provider, login, name).await {
        Ok(repo) => {
            info!(
                "Found remote repository {}",
                repo.full_name.as_deref().unwrap_or(name)
            );
            true
        }
        Err(e) if PublishError::severity_of(&e) == Severity::Expected => {
            info!("{}, creating it", e);
            let created = match ownership.mode {
                OwnerMode::Personal => provider.create_personal_repository(name).await,
                OwnerMode::Organization => {
                    provider.create_organization_repository(name, login).await
                }
            }
            .map_err(PublishError::from)
            .with_context(|| format!("Failed to create {}/{}", login, name))?;
            info!(
                "Created remote repository {}",
                created.html_url.as_deref().unwrap_or(&created.name)
            );
            false
        }
        Err(e) => return Err(e),
    };

    Ok(StepOutcome::Done(RemoteRepoRef {
        login: login.to_string(),
        name: name.to_string(),
        clone_url: provider.clone_url(login, name),
        exists,
    }))
}

fn write_ignore_file(project: &ProjectRef) -> Result<StepOutcome<()>> {
    if ensure_ignore_file(&project.directory)? {
        Ok(StepOutcome::Done(()))
    } else {
        Ok(StepOutcome::Skipped("ignore file already present".to_string()))
    }
}

fn plan_branch(
    project: &mut ProjectRef,
    refs: &version::RemoteRefs,
    prompter: &dyn Prompter,
) -> Result<StepOutcome<version::BranchPlan>> {
    let plan = version::resolve_branch(&project.version, refs, prompter)?;
    project.persist_version(&plan.resolved_version)?;
    Ok(StepOutcome::Done(plan))
}
