use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Engine-wide flags handed to every named window created by this engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Deliver dispatch groups in descending statement priority.
    pub prioritized_execution: bool,
    /// Let subqueries share the indexes maintained by a named window.
    pub subquery_index_share: bool,
}

/// Tuning for the per-cycle dispatch queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// A cycle draining more queued deltas than this logs a warning.
    pub warn_pending: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            warn_pending: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Resolved, validated engine configuration. Every section is optional, so an
/// empty document yields the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Read and parse an engine TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for EngineConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    const FULL_TOML: &str = r#"
[engine]
prioritized_execution = true
subquery_index_share = true

[dispatch]
warn_pending = 64

[logging]
level = "debug"
format = "json"
file = "logs/engine.log"

[logging.modules]
"nw_core::named" = "trace"
"#;

    #[test]
    fn parse_full_config() {
        let config: EngineConfig = FULL_TOML.parse().unwrap();
        assert!(config.engine.prioritized_execution);
        assert!(config.engine.subquery_index_share);
        assert_eq!(config.dispatch.warn_pending, 64);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("logs/engine.log"))
        );
        assert_eq!(config.logging.modules["nw_core::named"], "trace");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: EngineConfig = "".parse().unwrap();
        assert!(!config.engine.prioritized_execution);
        assert!(!config.engine.subquery_index_share);
        assert_eq!(config.dispatch.warn_pending, 10_000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Plain);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn partial_section_keeps_field_defaults() {
        let config: EngineConfig = "[engine]\nprioritized_execution = true\n".parse().unwrap();
        assert!(config.engine.prioritized_execution);
        assert!(!config.engine.subquery_index_share);
    }

    #[test]
    fn zero_warn_pending_rejected() {
        let err = "[dispatch]\nwarn_pending = 0\n"
            .parse::<EngineConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("warn_pending"), "{err}");
    }

    #[test]
    fn unknown_log_format_rejected() {
        assert!("[logging]\nformat = \"xml\"\n".parse::<EngineConfig>().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_TOML.as_bytes()).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert!(config.engine.prioritized_execution);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
