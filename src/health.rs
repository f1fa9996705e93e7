//! Preflight checks behind `branchwright doctor`
//!
//! Verifies that git is available, that stored provider credentials work and
//! that the project directory holds a publishable manifest.

use std::path::Path;

use crate::project::{ProjectRef, MANIFEST_FILE};
use crate::provider::{ProviderConnector, ProviderKind};
use crate::store::{ConfigStore, ProviderConfig, StoreKey};

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub git: CheckResult,
    /// Stored provider and token, verified against the provider
    pub credentials: CheckResult,
    pub manifest: CheckResult,
    /// SSH keys for the `git@host:` clone URLs (warning only)
    pub ssh: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    pub async fn run(
        store: &ConfigStore,
        connector: &dyn ProviderConnector,
        project_dir: &Path,
    ) -> Self {
        Self {
            git: Self::check_git(),
            credentials: Self::check_credentials(store, connector).await,
            manifest: Self::check_manifest(project_dir),
            ssh: Self::check_ssh(),
        }
    }

    /// Whether every required check passed; warnings do not count
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.credentials.passed && self.manifest.passed
    }

    pub fn errors(&self) -> Vec<&CheckResult> {
        self.results()
            .into_iter()
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.results().into_iter().filter(|r| r.is_warning).collect()
    }

    fn results(&self) -> [&CheckResult; 4] {
        [&self.git, &self.credentials, &self.manifest, &self.ssh]
    }

    fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    async fn check_credentials(
        store: &ConfigStore,
        connector: &dyn ProviderConnector,
    ) -> CheckResult {
        let kind = match store.read(StoreKey::Server) {
            Ok(Some(raw)) => match raw.parse::<ProviderKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    return CheckResult::error_with_details(
                        "Stored git hosting provider is invalid",
                        format!("{}\nRun: branchwright publish --refresh-server", e),
                    )
                }
            },
            Ok(None) => {
                return CheckResult::error_with_details(
                    "No git hosting provider configured",
                    "Run: branchwright publish",
                )
            }
            Err(e) => {
                return CheckResult::error_with_details(
                    "Cannot read credential store",
                    e.to_string(),
                )
            }
        };

        let token = match store.read(StoreKey::Token) {
            Ok(Some(token)) => token,
            Ok(None) => {
                return CheckResult::error_with_details(
                    format!("No {} access token stored", kind),
                    "Run: branchwright publish --refresh-token",
                )
            }
            Err(e) => {
                return CheckResult::error_with_details(
                    "Cannot read credential store",
                    e.to_string(),
                )
            }
        };

        let config = ProviderConfig { kind, token };
        let provider = match connector.connect(&config) {
            Ok(provider) => provider,
            Err(e) => {
                return CheckResult::error_with_details(
                    format!("Cannot connect to {}", kind),
                    e.to_string(),
                )
            }
        };

        match provider.get_user().await {
            Ok(user) => CheckResult::ok_with_details(
                format!("{} authentication successful", kind),
                format!("Username: {}", user.login),
            ),
            Err(e) => CheckResult::error_with_details(
                format!("{} authentication failed", kind),
                format!("{}\nRun: branchwright publish --refresh-token", e),
            ),
        }
    }

    fn check_manifest(project_dir: &Path) -> CheckResult {
        match ProjectRef::load(project_dir) {
            Ok(project) => CheckResult::ok_with_details(
                format!("{} is publishable", MANIFEST_FILE),
                format!("{}@{}", project.name, project.version),
            ),
            Err(e) => CheckResult::error_with_details(
                format!("{} is not publishable", MANIFEST_FILE),
                e.to_string(),
            ),
        }
    }

    fn check_ssh() -> CheckResult {
        let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
        if !ssh_dir.exists() {
            return CheckResult::warning_with_details(
                "~/.ssh directory not found",
                "Pushing over SSH may not work. Run: ssh-keygen -t ed25519",
            );
        }

        let found_keys: Vec<&str> = ["id_rsa", "id_ed25519", "id_ecdsa"]
            .into_iter()
            .filter(|key| ssh_dir.join(key).exists())
            .collect();

        if found_keys.is_empty() {
            CheckResult::warning_with_details(
                "No SSH keys found",
                "Pushing over SSH may not work. Run: ssh-keygen -t ed25519",
            )
        } else {
            CheckResult::ok_with_details("SSH keys found", found_keys.join(", "))
        }
    }

    /// All checks with their display names
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Git Installation", &self.git),
            ("Provider Credentials", &self.credentials),
            ("Project Manifest", &self.manifest),
            ("SSH Configuration", &self.ssh),
        ]
    }
}
