//! Failures while reading `states.toml`.

/// Why a configuration could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read states.toml: {0}")]
    Read(#[from] std::io::Error),

    /// The text is not valid TOML or does not match the expected tables.
    #[error("malformed states.toml: {0}")]
    Parse(String),

    /// A value parsed but is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let err = ConfigError::Parse("expected '=' at line 3".to_string());
        assert_eq!(err.to_string(), "malformed states.toml: expected '=' at line 3");

        let err: ConfigError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.to_string(), "cannot read states.toml: denied");
    }

    #[test]
    fn invalid_setting_message() {
        let err = ConfigError::Invalid("clock_period_ms must be positive".to_string());
        assert_eq!(err.to_string(), "invalid setting: clock_period_ms must be positive");
    }
}
