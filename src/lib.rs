//! branchwright - Release-branch orchestrator for git-hosted projects
//!
//! branchwright takes a local project, makes sure a matching repository exists
//! on the chosen hosting provider, and publishes the working tree to a
//! versioned `dev/<semver>` branch that never collides with an existing
//! `release/<semver>` tag.
//!
//! ## Core Features
//!
//! - **Provider Integration**: GitHub and Gitee REST APIs behind one trait
//! - **Version Resolution**: Next dev branch computed from remote release tags
//! - **Idempotent Linking**: Repeated runs skip work that is already done
//! - **Persisted Choices**: Provider, token and owner stored as plain files
//! - **Configuration Management**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`pipeline`]: The publish workflow, the only entry point the CLI uses
//! - [`sync`]: Local repository state machine
//! - [`version`]: Release tag parsing and branch resolution
//! - [`provider`]: Hosting provider clients
//! - [`store`]: Credential and choice store
//! - [`git`]: Git primitives over the `git` executable

pub mod config;
pub mod error;
pub mod git;
pub mod health;
pub mod ignore;
pub mod pipeline;
pub mod project;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod sync;
pub mod version;

pub use config::Config;
pub use error::{PublishError, RemoteError, Severity};
pub use git::{GitCli, GitOps, StatusReport};
pub use health::HealthCheck;
pub use pipeline::{PublishOptions, PublishReport, Publisher, StepOutcome, StepStatus};
pub use project::ProjectRef;
pub use prompt::{Prompter, TerminalPrompter};
pub use provider::{HostingProvider, HttpConnector, Provider, ProviderConnector, ProviderKind};
pub use store::ConfigStore;
pub use sync::Synchronizer;
pub use version::{BranchPlan, RemoteRefs};
