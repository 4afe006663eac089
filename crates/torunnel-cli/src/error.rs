//! CLI error type distinguishing bad input from failed runs.

use std::fmt::{self, Display, Formatter};

use torunnel_app::AppError;
use torunnel_config::ConfigError;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn from_config(error: &ConfigError) -> Self {
        match error {
            ConfigError::InvalidField {
                section,
                field,
                value,
                reason,
            } => Self::validation(match value {
                Some(value) => format!("invalid {section}.{field} ({reason}): {value}"),
                None => format!("invalid {section}.{field} ({reason})"),
            }),
            ConfigError::Io { operation, source } => {
                Self::failure(anyhow::anyhow!("configuration {operation} failed: {source}"))
            }
        }
    }

    pub(crate) fn from_app(error: AppError) -> Self {
        if error.is_invalid_input() {
            Self::validation(error.detail())
        } else {
            let detail = error.detail();
            Self::failure(anyhow::Error::new(error).context(detail))
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}
