use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
///
/// Fetch failures are not CLI errors: they are rendered as JSON and exit
/// with code 3.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] tickerfeed_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(#[from] tickerfeed_core::CoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
