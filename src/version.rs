//! Version and branch resolution
//!
//! Remote refs are listed once per publish and split into release tags
//! (`refs/tags/release/<semver>`) and dev branches (`refs/heads/dev/<semver>`).
//! The next working branch is `dev/<version>` where the version is either the
//! local one, or a bump of the latest release chosen interactively.

use anyhow::Result;
use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;
use tracing::{debug, info};

use crate::prompt::Prompter;

pub const RELEASE_PREFIX: &str = "release";
pub const DEV_PREFIX: &str = "dev";

const TAG_NAMESPACE: &str = "refs/tags/";
const HEAD_NAMESPACE: &str = "refs/heads/";

/// Version increment kinds offered when the local version is already released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    Patch,
    Minor,
    Major,
}

impl Increment {
    pub const ALL: [Increment; 3] = [Increment::Patch, Increment::Minor, Increment::Major];

    /// Bump a version the way `npm version` does
    ///
    /// A pre-release is promoted to its release when the lower components
    /// already allow it (e.g. `1.3.0-beta.1` + minor = `1.3.0`).
    pub fn apply(&self, version: &Version) -> Version {
        let has_pre = !version.pre.is_empty();
        let mut next = Version::new(version.major, version.minor, version.patch);

        match self {
            Increment::Major => {
                if !(has_pre && version.minor == 0 && version.patch == 0) {
                    next.major += 1;
                }
                next.minor = 0;
                next.patch = 0;
            }
            Increment::Minor => {
                if !(has_pre && version.patch == 0) {
                    next.minor += 1;
                }
                next.patch = 0;
            }
            Increment::Patch => {
                if !has_pre {
                    next.patch += 1;
                }
            }
        }

        next.pre = Prerelease::EMPTY;
        next.build = BuildMetadata::EMPTY;
        next
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Increment::Patch => "patch",
            Increment::Minor => "minor",
            Increment::Major => "major",
        })
    }
}

/// Snapshot of one `git ls-remote --refs` listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRefs {
    /// Versions of `release/<semver>` tags, highest first
    pub releases: Vec<Version>,
    /// Versions of `dev/<semver>` branches, highest first
    pub dev_versions: Vec<Version>,
    /// Every branch name on the remote
    pub heads: Vec<String>,
}

impl RemoteRefs {
    pub fn parse<S: AsRef<str>>(refs: &[S]) -> Self {
        let mut snapshot = RemoteRefs::default();

        for full in refs {
            let full: &str = full.as_ref();
            if let Some(tag) = full.strip_prefix(TAG_NAMESPACE) {
                if let Some(version) = parse_prefixed(tag, RELEASE_PREFIX) {
                    snapshot.releases.push(version);
                }
            } else if let Some(head) = full.strip_prefix(HEAD_NAMESPACE) {
                if let Some(version) = parse_prefixed(head, DEV_PREFIX) {
                    snapshot.dev_versions.push(version);
                }
                snapshot.heads.push(head.to_string());
            }
        }

        snapshot.releases.sort_by(|a, b| b.cmp(a));
        snapshot.dev_versions.sort_by(|a, b| b.cmp(a));
        snapshot
    }

    pub fn latest_release(&self) -> Option<&Version> {
        self.releases.first()
    }

    pub fn has_head(&self, branch: &str) -> bool {
        self.heads.iter().any(|head| head == branch)
    }

    pub fn has_dev_branch(&self, version: &Version) -> bool {
        self.dev_versions.iter().any(|v| v == version)
    }
}

fn parse_prefixed(name: &str, prefix: &str) -> Option<Version> {
    let raw = name.strip_prefix(prefix)?.strip_prefix('/')?;
    match Version::parse(raw) {
        Ok(version) => Some(version),
        Err(e) => {
            debug!("Ignoring {}/{}: {}", prefix, raw, e);
            None
        }
    }
}

/// Name of the working branch for a version
pub fn dev_branch_name(version: &Version) -> String {
    format!("{}/{}", DEV_PREFIX, version)
}

/// The working branch chosen for this publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPlan {
    pub branch_name: String,
    pub resolved_version: Version,
    /// Whether the version was bumped past the latest release
    pub bumped: bool,
}

impl BranchPlan {
    fn for_version(version: Version, bumped: bool) -> Self {
        Self {
            branch_name: dev_branch_name(&version),
            resolved_version: version,
            bumped,
        }
    }
}

/// What the resolver needs before it can produce a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The local version is newer than any release
    KeepLocal,
    /// The local version is already released; pick an increment of this release
    BumpFrom(Version),
}

/// Pure comparison of the local version with the latest release
pub fn decide(local: &Version, latest_release: Option<&Version>) -> Decision {
    match latest_release {
        None => Decision::KeepLocal,
        Some(latest) if local > latest => Decision::KeepLocal,
        Some(latest) => Decision::BumpFrom(latest.clone()),
    }
}

/// Resolve the working branch, asking for an increment only when needed
pub fn resolve_branch(
    local: &Version,
    refs: &RemoteRefs,
    prompter: &dyn Prompter,
) -> Result<BranchPlan> {
    match decide(local, refs.latest_release()) {
        Decision::KeepLocal => {
            let plan = BranchPlan::for_version(local.clone(), false);
            info!("Working branch: {}", plan.branch_name);
            Ok(plan)
        }
        Decision::BumpFrom(latest) => {
            info!(
                "Local version {} is not newer than release {}, choosing an increment",
                local, latest
            );
            let increment = prompter.select_increment(&latest)?;
            let plan = BranchPlan::for_version(increment.apply(&latest), true);
            info!(
                "Bumped {} ({}) -> working branch {}",
                latest, increment, plan.branch_name
            );
            Ok(plan)
        }
    }
}
