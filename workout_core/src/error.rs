//! Error types for the workout_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for workout_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced workout, plan item, block or variant does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The access-control collaborator refused the caller
    #[error("Unauthorized access: {0}")]
    UnauthorizedAccess(String),

    /// The request references a combination the snapshot does not contain
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The snapshot breaks a structural invariant
    #[error("Structure inconsistent: {0}")]
    StructureInconsistent(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable code for the error, suitable for handing to callers
    /// that map failures onto their own presentation.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::UnauthorizedAccess(_) => "UNAUTHORIZED_ACCESS",
            Error::InvalidParameters(_) => "INVALID_PARAMETERS",
            Error::StructureInconsistent(_) => "STRUCTURE_INCONSISTENT",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Toml(_) => "TOML_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(Error::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            Error::UnauthorizedAccess("x".into()).code(),
            "UNAUTHORIZED_ACCESS"
        );
        assert_eq!(
            Error::InvalidParameters("x".into()).code(),
            "INVALID_PARAMETERS"
        );
        assert_eq!(
            Error::StructureInconsistent("x".into()).code(),
            "STRUCTURE_INCONSISTENT"
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::StructureInconsistent("Block 'b1' has no variants".into());
        assert_eq!(
            err.to_string(),
            "Structure inconsistent: Block 'b1' has no variants"
        );
    }
}
