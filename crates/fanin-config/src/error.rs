use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The document is not valid JSON or does not match the expected shape.
  #[error("failed to parse config: {message}")]
  Parse { message: String },

  /// The document parsed but describes something that cannot run.
  #[error("invalid config: {message}")]
  Invalid { message: String },
}

impl ConfigError {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Invalid {
      message: message.into(),
    }
  }
}
