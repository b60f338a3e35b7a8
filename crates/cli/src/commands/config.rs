//! Config command - write a starter config file

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => {
            write_example(&path, force).await?;
            println!("Wrote {}", path.display());
            println!("Any key can be overridden with POEM_ENRICHER__<SECTION>__<KEY>");
            Ok(())
        }
    }
}

/// Write the example config to `path`, refusing to replace a file unless `force`
async fn write_example(path: &Path, force: bool) -> Result<()> {
    let exists = fs::try_exists(path)
        .await
        .with_context(|| format!("Cannot inspect {}", path.display()))?;
    if exists && !force {
        anyhow::bail!(
            "{} already exists (pass --force to replace it)",
            path.display()
        );
    }

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    fs::write(path, AppConfig::example_toml())
        .await
        .with_context(|| format!("Cannot write {}", path.display()))?;

    tracing::debug!(path = %path.display(), force, "Example config written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_example_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_example(&path, false).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, AppConfig::example_toml());
    }

    #[tokio::test]
    async fn test_write_example_respects_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine").unwrap();

        let err = write_example(&path, false).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");

        write_example(&path, true).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[translation]"));
    }
}
