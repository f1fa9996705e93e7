//! Local repository synchronizer
//!
//! Drives the working tree through `unlinked -> linked -> synced` and then the
//! per-run commit cycle. Every operation checks whether its work is already
//! done and reports [`StepOutcome::Skipped`] instead of repeating it, so a run
//! interrupted halfway can simply be started again.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::git::{GitOps, PullOptions, StatusReport, CONTROL_DIR};
use crate::pipeline::StepOutcome;
use crate::prompt::Prompter;
use crate::version::{BranchPlan, RemoteRefs};

/// How the first synchronization with the remote went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSync {
    /// Remote master existed and was merged into the fresh local history
    PulledMaster,
    /// Remote was empty, local master was pushed
    PushedMaster,
}

/// Whether the working branch had to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkout {
    Existing,
    Created,
}

pub struct Synchronizer<'a> {
    git: &'a dyn GitOps,
    prompter: &'a dyn Prompter,
    dir: PathBuf,
    remote: String,
    master: String,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        git: &'a dyn GitOps,
        prompter: &'a dyn Prompter,
        dir: &Path,
        settings: &PublishConfig,
    ) -> Self {
        Self {
            git,
            prompter,
            dir: dir.to_path_buf(),
            remote: settings.remote.clone(),
            master: settings.master_branch.clone(),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.dir.join(CONTROL_DIR).exists()
    }

    /// Initialise version control and point the remote at `clone_url`
    ///
    /// An existing remote of the same name is left untouched.
    pub async fn link(&self, clone_url: &str) -> Result<StepOutcome<()>> {
        if self.is_linked() {
            return Ok(StepOutcome::Skipped(format!(
                "{} already under version control",
                self.dir.display()
            )));
        }

        info!("Initialising git repository in {}", self.dir.display());
        self.git
            .init(&self.master)
            .await
            .context("Failed to initialise repository")?;

        let remotes = self.git.remotes().await?;
        if remotes.iter().any(|r| r.name == self.remote) {
            debug!("Remote {} already configured", self.remote);
        } else {
            self.git
                .add_remote(&self.remote, clone_url)
                .await
                .with_context(|| format!("Failed to add remote {}", self.remote))?;
            info!("Added remote {} -> {}", self.remote, clone_url);
        }

        Ok(StepOutcome::Done(()))
    }

    pub async fn remote_refs(&self) -> Result<RemoteRefs> {
        let refs = self
            .git
            .list_remote_refs(&self.remote)
            .await
            .with_context(|| format!("Failed to list refs of {}", self.remote))?;
        let refs = RemoteRefs::parse(&refs);
        debug!(
            "Remote {}: {} releases, {} dev branches, {} heads",
            self.remote,
            refs.releases.len(),
            refs.dev_versions.len(),
            refs.heads.len()
        );
        Ok(refs)
    }

    /// Fail if the working tree has unresolved conflicts
    pub async fn check_conflicted(&self) -> Result<StatusReport> {
        let status = self.git.status().await.context("Failed to read status")?;
        if !status.conflicted.is_empty() {
            return Err(PublishError::ConflictDetected(status.conflicted).into());
        }
        Ok(status)
    }

    /// Stage every pending change in one batch and commit it
    ///
    /// Returns the number of staged paths.
    pub async fn commit_pending(&self, status: &StatusReport) -> Result<StepOutcome<usize>> {
        if !status.has_pending_changes() {
            return Ok(StepOutcome::Skipped("nothing to commit".to_string()));
        }

        let paths = status.pending_paths();
        self.git.add(&paths).await.context("Failed to stage changes")?;

        let message = loop {
            let message = self.prompter.input_commit_message()?;
            let message = message.trim();
            if !message.is_empty() {
                break message.to_string();
            }
            warn!("{}", PublishError::CommitMessageRequired);
        };

        self.git.commit(&message).await.context("Failed to commit")?;
        info!("Committed {} changed paths", paths.len());
        Ok(StepOutcome::Done(paths.len()))
    }

    /// Conflict check followed by a commit of whatever is pending
    pub async fn commit_changes(&self) -> Result<StepOutcome<usize>> {
        let status = self.check_conflicted().await?;
        self.commit_pending(&status).await
    }

    /// Make sure the remote has a master branch
    ///
    /// Decided from the remote's refs rather than from whether this run linked
    /// the repository, so a push lost in an earlier run is retried. A repository
    /// linked by this run merges an existing remote master as unrelated history.
    pub async fn initial_sync(&self, freshly_linked: bool) -> Result<StepOutcome<InitialSync>> {
        let refs = self.remote_refs().await?;
        let remote_has_master = refs.has_head(&self.master);
        if remote_has_master && !freshly_linked {
            return Ok(StepOutcome::Skipped(format!(
                "{} already has {}",
                self.remote, self.master
            )));
        }

        self.commit_changes().await?;

        if remote_has_master {
            info!("Merging existing {}/{}", self.remote, self.master);
            self.pull_merge(
                &self.master,
                PullOptions {
                    allow_unrelated_histories: true,
                },
            )
            .await?;
            Ok(StepOutcome::Done(InitialSync::PulledMaster))
        } else {
            info!("{} has no {}, pushing it", self.remote, self.master);
            self.push_branch(&self.master).await?;
            Ok(StepOutcome::Done(InitialSync::PushedMaster))
        }
    }

    /// Pop the most recent stash entry if there is one
    pub async fn restore_stash(&self) -> Result<StepOutcome<()>> {
        let entries = self
            .git
            .stash_list()
            .await
            .map_err(|e| PublishError::StashRestoreFailed(format!("{:#}", e)))?;
        if entries.is_empty() {
            return Ok(StepOutcome::Skipped("no stashed changes".to_string()));
        }

        debug!("Restoring {}", entries[0]);
        self.git
            .stash_pop()
            .await
            .map_err(|e| PublishError::StashRestoreFailed(format!("{:#}", e)))?;
        info!("Restored stashed changes");
        Ok(StepOutcome::Done(()))
    }

    pub async fn checkout_branch(&self, plan: &BranchPlan) -> Result<StepOutcome<Checkout>> {
        let branches = self.git.local_branches().await?;
        let branch = plan.branch_name.as_str();

        if branches.iter().any(|b| b == branch) {
            self.git
                .checkout(branch)
                .await
                .with_context(|| format!("Failed to check out {}", branch))?;
            info!("Checked out {}", branch);
            Ok(StepOutcome::Done(Checkout::Existing))
        } else {
            self.git
                .checkout_new_branch(branch)
                .await
                .with_context(|| format!("Failed to create {}", branch))?;
            info!("Created branch {}", branch);
            Ok(StepOutcome::Done(Checkout::Created))
        }
    }

    /// Pull a remote branch, telling a conflicting merge apart from any other failure
    async fn pull_merge(&self, branch: &str, options: PullOptions) -> Result<()> {
        let Err(e) = self.git.pull(&self.remote, branch, options).await else {
            return Ok(());
        };

        let status = self.git.status().await.context("Failed to read status")?;
        if !status.conflicted.is_empty() {
            return Err(PublishError::ConflictDetected(status.conflicted).into());
        }

        Err(PublishError::PullFailed {
            remote: self.remote.clone(),
            branch: branch.to_string(),
            reason: format!("{:#}", e),
        }
        .into())
    }

    pub async fn merge_master(&self, refs: &RemoteRefs) -> Result<StepOutcome<()>> {
        if !refs.has_head(&self.master) {
            return Ok(StepOutcome::Skipped(format!(
                "{} has no {} branch",
                self.remote, self.master
            )));
        }

        self.pull_merge(&self.master, PullOptions::default()).await?;
        self.check_conflicted().await?;
        info!("Merged {}/{}", self.remote, self.master);
        Ok(StepOutcome::Done(()))
    }

    pub async fn merge_dev_branch(
        &self,
        plan: &BranchPlan,
        refs: &RemoteRefs,
    ) -> Result<StepOutcome<()>> {
        if !refs.has_dev_branch(&plan.resolved_version) {
            return Ok(StepOutcome::Skipped(format!(
                "{} does not exist on {} yet",
                plan.branch_name, self.remote
            )));
        }

        self.pull_merge(&plan.branch_name, PullOptions::default())
            .await?;
        self.check_conflicted().await?;
        info!("Merged {}/{}", self.remote, plan.branch_name);
        Ok(StepOutcome::Done(()))
    }

    pub async fn push_branch(&self, branch: &str) -> Result<StepOutcome<()>> {
        self.git
            .push(&self.remote, branch)
            .await
            .map_err(|e| PublishError::PushFailed {
                remote: self.remote.clone(),
                branch: branch.to_string(),
                reason: format!("{:#}", e),
            })?;
        info!("Pushed {} to {}", branch, self.remote);
        Ok(StepOutcome::Done(()))
    }
}
