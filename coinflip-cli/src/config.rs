use anyhow::{Context, Result};
use coinflip_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "coinflip.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub ledger: LedgerConfig,
    /// Relative paths resolve against the data directory.
    pub db_file: PathBuf,
    pub vault_file: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            db_file: PathBuf::from("coinflip.db"),
            vault_file: PathBuf::from("secrets.json"),
        }
    }
}

impl CliConfig {
    /// Read `<data_dir>/coinflip.json`, writing the defaults on first run.
    pub async fn load_or_init(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: CliConfig = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            config.ledger.validate()?;
            return Ok(config);
        }

        let config = CliConfig::default();
        let content = serde_json::to_string_pretty(&config)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!("Wrote default config to {}", path.display());
        Ok(config)
    }

    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.db_file)
    }

    pub fn vault_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.vault_file)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coinflip")
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinflip_ledger::RevealScheme;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_first_run_writes_defaults() {
        let dir = tempdir().unwrap();

        let config = CliConfig::load_or_init(dir.path()).await.unwrap();
        assert_eq!(config.ledger, LedgerConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.db_path(dir.path()), dir.path().join("coinflip.db"));
    }

    #[tokio::test]
    async fn test_existing_config_is_read_back() {
        let dir = tempdir().unwrap();
        let custom = CliConfig {
            ledger: LedgerConfig::new(RevealScheme::Basic)
                .with_forfeit_timeout(Duration::from_secs(600)),
            ..CliConfig::default()
        };
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            serde_json::to_string(&custom).unwrap(),
        )
        .unwrap();

        let config = CliConfig::load_or_init(dir.path()).await.unwrap();
        assert_eq!(config.ledger, custom.ledger);
    }

    #[tokio::test]
    async fn test_invalid_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        let broken = CliConfig {
            ledger: LedgerConfig::default().with_forfeit_timeout(Duration::ZERO),
            ..CliConfig::default()
        };
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            serde_json::to_string(&broken).unwrap(),
        )
        .unwrap();

        assert!(CliConfig::load_or_init(dir.path()).await.is_err());
    }
}
