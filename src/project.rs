use anyhow::{Context, Result};
use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::PublishError;

pub const MANIFEST_FILE: &str = "package.json";

/// The project being published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub name: String,
    pub version: Version,
    pub directory: PathBuf,
}

impl ProjectRef {
    /// Read name and version from the project manifest
    ///
    /// The manifest must also declare a `build` script; projects without one
    /// cannot be published.
    pub fn load(directory: &Path) -> Result<Self> {
        let manifest = read_manifest(directory)?;

        let name = manifest
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| PublishError::Manifest("missing \"name\"".into()))?;
        let raw_version = manifest
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Manifest("missing \"version\"".into()))?;
        let has_build = manifest
            .get("scripts")
            .and_then(|scripts| scripts.get("build"))
            .and_then(Value::as_str)
            .is_some();
        if !has_build {
            return Err(PublishError::Manifest("missing \"scripts.build\"".into()).into());
        }

        let version = Version::parse(raw_version.trim()).map_err(|e| {
            PublishError::Manifest(format!("invalid version {:?}: {}", raw_version, e))
        })?;

        debug!("Loaded project {}@{} from {}", name, version, directory.display());

        Ok(Self {
            name: name.to_string(),
            version,
            directory: directory.to_path_buf(),
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE)
    }

    /// Rewrite the manifest version, leaving every other field and its order intact
    ///
    /// Returns false when the version was already up to date.
    pub fn persist_version(&mut self, version: &Version) -> Result<bool> {
        if &self.version == version {
            return Ok(false);
        }

        let mut manifest = read_manifest(&self.directory)?;
        let object = manifest
            .as_object_mut()
            .ok_or_else(|| PublishError::Manifest("top level is not an object".into()))?;
        object.insert("version".to_string(), Value::String(version.to_string()));

        let mut content =
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        content.push('\n');

        let path = self.manifest_path();
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Updated {} version {} -> {}", MANIFEST_FILE, self.version, version);
        self.version = version.clone();
        Ok(true)
    }
}

fn read_manifest(directory: &Path) -> Result<Value> {
    let path = directory.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(PublishError::Manifest(format!("{} not found", path.display())).into());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let manifest: Value = serde_json::from_str(&content)
        .map_err(|e| PublishError::Manifest(format!("{}: {}", path.display(), e)))?;
    Ok(manifest)
}
