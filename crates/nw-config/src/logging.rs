use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// `[logging]` section of the engine config. Every field has a default, so
/// an engine that only embeds the named window service can omit it.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global level filter, e.g. `"info"`.
    pub level: String,
    /// Per-target overrides, ordered by target so filter directives are
    /// stable: `{ "nw_core::named" = "debug", "nw_runtime" = "info" }`.
    pub modules: BTreeMap<String, String>,
    /// Log file; relative paths are taken from the config file's directory.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: BTreeMap::new(),
            file: None,
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    /// Absolute location of the log file, if one is configured.
    pub fn resolve_file(&self, base_dir: &Path) -> Option<PathBuf> {
        self.file.as_ref().map(|file| {
            if file.is_relative() {
                base_dir.join(file)
            } else {
                file.clone()
            }
        })
    }
}

/// `plain` prints `[domain]`-prefixed lines; `json` one object per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_file_joins_config_dir() {
        let config = LoggingConfig {
            file: Some("logs/engine.log".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(
            config.resolve_file(Path::new("/etc/nw")),
            Some(PathBuf::from("/etc/nw/logs/engine.log"))
        );
    }

    #[test]
    fn absolute_file_kept() {
        let config = LoggingConfig {
            file: Some("/var/log/nw.log".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(
            config.resolve_file(Path::new("/etc/nw")),
            Some(PathBuf::from("/var/log/nw.log"))
        );
        assert!(LoggingConfig::default().resolve_file(Path::new("/")).is_none());
    }
}
