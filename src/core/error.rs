use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Row ambiguity: {0}")]
    RowAmbiguity(String),

    #[error("Entity type '{0}' not found")]
    EntityTypeNotFound(String),

    #[error("Property '{0}' not found on entity type '{1}'")]
    PropertyNotFound(String, String),

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl ModelError {
    /// Errors raised while building the model abort finalization entirely.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationConflict(_)
                | Self::MissingReference(_)
                | Self::EntityTypeNotFound(_)
                | Self::PropertyNotFound(_, _)
                | Self::InvalidDeclaration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
