use crate::engine::EngineConfig;

/// Reject configurations that parse but cannot drive an engine.
pub fn validate(config: &EngineConfig) -> anyhow::Result<()> {
    if config.dispatch.warn_pending == 0 {
        anyhow::bail!("dispatch.warn_pending must be greater than zero");
    }
    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn blank_level_rejected() {
        let mut config = EngineConfig::default();
        config.logging.level = "  ".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }
}
