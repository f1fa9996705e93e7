use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Directory whose presence marks a project as already under version control
pub const CONTROL_DIR: &str = ".git";

/// A configured remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedFile {
    pub from: String,
    pub to: String,
}

/// Working tree status split into the categories the commit step cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub not_added: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
    pub renamed: Vec<RenamedFile>,
    pub conflicted: Vec<String>,
}

impl StatusReport {
    /// Every path with a pending change, in one batch suitable for `git add`
    pub fn pending_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        paths.extend(self.not_added.iter().cloned());
        paths.extend(self.created.iter().cloned());
        paths.extend(self.deleted.iter().cloned());
        paths.extend(self.modified.iter().cloned());
        paths.extend(self.renamed.iter().map(|r| r.to.clone()));
        paths.dedup();
        paths
    }

    pub fn has_pending_changes(&self) -> bool {
        !(self.not_added.is_empty()
            && self.created.is_empty()
            && self.deleted.is_empty()
            && self.modified.is_empty()
            && self.renamed.is_empty())
    }

    /// Parse `git status --porcelain=v1 -z` output
    pub fn parse_porcelain_z(output: &str) -> Self {
        let mut report = StatusReport::default();
        let mut entries = output.split('\0').filter(|e| !e.is_empty());

        while let Some(entry) = entries.next() {
            if entry.len() < 4 {
                continue;
            }
            let (code, path) = entry.split_at(3);
            let mut flags = code.chars();
            let index = flags.next().unwrap_or(' ');
            let worktree = flags.next().unwrap_or(' ');
            let path = path.to_string();

            match (index, worktree) {
                ('?', '?') => report.not_added.push(path),
                ('!', '!') => {}
                ('D', 'D') | ('A', 'A') | ('U', _) | (_, 'U') => report.conflicted.push(path),
                ('R', _) | ('C', _) => {
                    // The source path follows as its own NUL-terminated entry
                    let from = entries.next().unwrap_or_default().to_string();
                    if index == 'R' {
                        report.renamed.push(RenamedFile { from, to: path });
                    } else {
                        report.created.push(path);
                    }
                }
                ('A', _) => report.created.push(path),
                ('D', _) | (_, 'D') => report.deleted.push(path),
                _ => report.modified.push(path),
            }
        }

        report
    }
}

/// Options for `git pull`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOptions {
    pub allow_unrelated_histories: bool,
}

/// The git operations the publish workflow is built from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Create an empty repository whose unborn HEAD points at `initial_branch`
    async fn init(&self, initial_branch: &str) -> Result<()>;

    async fn add(&self, paths: &[String]) -> Result<()>;

    async fn commit(&self, message: &str) -> Result<()>;

    async fn push(&self, remote: &str, branch: &str) -> Result<()>;

    async fn pull(&self, remote: &str, branch: &str, options: PullOptions) -> Result<()>;

    async fn local_branches(&self) -> Result<Vec<String>>;

    /// Full ref names (`refs/heads/...`, `refs/tags/...`) advertised by a remote
    async fn list_remote_refs(&self, remote: &str) -> Result<Vec<String>>;

    async fn checkout(&self, branch: &str) -> Result<()>;

    async fn checkout_new_branch(&self, branch: &str) -> Result<()>;

    async fn add_remote(&self, name: &str, url: &str) -> Result<()>;

    async fn remotes(&self) -> Result<Vec<Remote>>;

    async fn stash_list(&self) -> Result<Vec<String>>;

    async fn stash_pop(&self) -> Result<()>;

    async fn status(&self) -> Result<StatusReport>;
}

/// `GitOps` backed by the system `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("git {}", args.join(" "));

        let output = AsyncCommand::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .await
            .with_context(|| format!("Failed to execute git {}", args.first().unwrap_or(&"")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(anyhow!("git {} failed: {}", args.join(" "), detail.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ref names from `git ls-remote` output (`<sha>\t<ref>` per line)
pub fn parse_ls_remote(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

/// Remotes from `git remote -v` output, fetch URLs only
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        if remotes.iter().any(|r| r.name == name) {
            continue;
        }
        remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    remotes
}

#[async_trait]
impl GitOps for GitCli {
    async fn init(&self, initial_branch: &str) -> Result<()> {
        self.run(&["init"]).await?;
        let head = format!("refs/heads/{}", initial_branch);
        self.run(&["symbolic-ref", "HEAD", &head]).await.map(drop)
    }

    async fn add(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--all", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await.map(drop)
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", remote, branch]).await.map(drop)
    }

    async fn pull(&self, remote: &str, branch: &str, options: PullOptions) -> Result<()> {
        let mut args = vec!["pull", "--no-rebase", remote, branch];
        if options.allow_unrelated_histories {
            args.push("--allow-unrelated-histories");
        }
        self.run(&args).await.map(drop)
    }

    async fn local_branches(&self) -> Result<Vec<String>> {
        let output = self.run(&["branch", "--format=%(refname:short)"]).await?;
        Ok(non_empty_lines(&output))
    }

    async fn list_remote_refs(&self, remote: &str) -> Result<Vec<String>> {
        let output = self.run(&["ls-remote", "--refs", remote]).await?;
        Ok(parse_ls_remote(&output))
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).await.map(drop)
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch]).await.map(drop)
    }

    async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.run(&["remote", "add", name, url]).await.map(drop)
    }

    async fn remotes(&self) -> Result<Vec<Remote>> {
        let output = self.run(&["remote", "-v"]).await?;
        Ok(parse_remotes(&output))
    }

    async fn stash_list(&self) -> Result<Vec<String>> {
        let output = self.run(&["stash", "list"]).await?;
        Ok(non_empty_lines(&output))
    }

    async fn stash_pop(&self) -> Result<()> {
        self.run(&["stash", "pop"]).await.map(drop)
    }

    async fn status(&self) -> Result<StatusReport> {
        let output = self
            .run(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])
            .await?;
        Ok(StatusReport::parse_porcelain_z(&output))
    }
}
