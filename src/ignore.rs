use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

pub const IGNORE_FILE: &str = ".gitignore";

const DEFAULT_IGNORE: &str = "\
.DS_Store
node_modules
/dist

# local env files
.env.local
.env.*.local

# Log files
npm-debug.log*
yarn-debug.log*
yarn-error.log*
pnpm-debug.log*

# Editor directories and files
.idea
.vscode
*.suo
*.ntvs*
*.njsproj
*.sln
*.sw?
";

/// Write the default ignore manifest unless the project already has one
///
/// Returns whether a file was written.
pub fn ensure_ignore_file(dir: &Path) -> Result<bool> {
    let path = dir.join(IGNORE_FILE);
    if path.exists() {
        debug!("{} already present", path.display());
        return Ok(false);
    }

    std::fs::write(&path, DEFAULT_IGNORE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Created {}", path.display());
    Ok(true)
}
