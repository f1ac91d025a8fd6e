use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] solwatch_core::CoreError),

    #[error(transparent)]
    Session(#[from] solwatch_core::SessionError),

    #[error(transparent)]
    Config(#[from] solwatch_core::ConfigError),

    #[error("{failed} of {total} wallet(s) could not be fetched")]
    WalletsFailed { failed: usize, total: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Core(solwatch_core::CoreError::Serialization(_)) => 4,
            Self::Core(_) => 2,
            Self::Session(_) => 2,
            Self::Config(_) => 11,
            Self::WalletsFailed { .. } => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solwatch_core::{Address, ConfigError, CoreError, PreconditionError};

    #[test]
    fn exit_codes_follow_error_category() {
        let invalid = Address::parse("nope").expect_err("invalid");
        assert_eq!(CliError::from(CoreError::from(invalid)).exit_code(), 2);
        assert_eq!(
            CliError::from(CoreError::from(PreconditionError::EmptyAddressSet)).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(ConfigError::Zero { name: "history_depth" }).exit_code(),
            11
        );
        assert_eq!(CliError::WalletsFailed { failed: 1, total: 2 }.exit_code(), 3);
    }
}
