use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use simplelog::LevelFilter;

/// Runtime settings for the hub, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Level written to the log file. `TREEGRID_LOG`, default `info`.
    pub log_level: LevelFilter,
    /// Reported to the engine as the host's multi-selection flag.
    /// `TREEGRID_MULTI_SELECT`, default off.
    pub multi_select: bool,
    /// Where the log file lives: `~/.local/share/treegrid` (XDG-compliant).
    pub data_dir: PathBuf,
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        let dirs =
            ProjectDirs::from("", "", "treegrid").context("Could not determine data directory")?;
        Self::from_lookup(dirs.data_dir().to_path_buf(), |key| std::env::var(key).ok())
    }

    /// Build from any variable source, so tests do not touch the process
    /// environment.
    pub fn from_lookup(
        data_dir: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let log_level = match lookup("TREEGRID_LOG") {
            Some(raw) => LevelFilter::from_str(raw.trim())
                .map_err(|_| anyhow::anyhow!("TREEGRID_LOG: unknown level {raw:?}"))?,
            None => LevelFilter::Info,
        };
        let multi_select = match lookup("TREEGRID_MULTI_SELECT") {
            Some(raw) => parse_flag(&raw).context("TREEGRID_MULTI_SELECT")?,
            None => false,
        };
        Ok(Self {
            log_level,
            multi_select,
            data_dir,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("treegrid.log")
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<HubConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HubConfig::from_lookup(PathBuf::from("/tmp/treegrid"), |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(!config.multi_select);
        assert_eq!(config.log_path(), PathBuf::from("/tmp/treegrid/treegrid.log"));
    }

    #[test]
    fn test_reads_variables() {
        let config = config(&[("TREEGRID_LOG", "trace"), ("TREEGRID_MULTI_SELECT", "Yes")]).unwrap();
        assert_eq!(config.log_level, LevelFilter::Trace);
        assert!(config.multi_select);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(config(&[("TREEGRID_LOG", "loud")]).is_err());
        assert!(config(&[("TREEGRID_MULTI_SELECT", "maybe")]).is_err());
    }
}
