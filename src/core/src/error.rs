use thiserror::Error;

/// Errors produced while executing a build.
///
/// Every variant that originates in an instruction carries the instruction
/// name so the message is actionable on its own.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Image could not be resolved, even after a pull
    #[error("{instruction}: Failed to inspect image after pull: {image}")]
    ImageNotFound { instruction: String, image: String },

    /// An engine client operation failed
    #[error("{instruction}: {message}")]
    Engine {
        instruction: String,
        message: String,
    },

    /// The build state does not allow the instruction to run
    #[error("{instruction}: {message}")]
    Precondition {
        instruction: String,
        message: String,
    },

    /// Container removal failed after the image was already committed
    #[error(
        "{instruction}: Failed to remove container {container_id} \
         after committing image {image_id}: {message}"
    )]
    Cleanup {
        instruction: String,
        container_id: String,
        image_id: String,
        message: String,
    },

    /// Malformed instruction arguments
    #[error("{instruction}: {message}")]
    InvalidArguments {
        instruction: String,
        message: String,
    },

    /// Producing the content archive for a container upload failed
    #[error("{instruction}: Failed to archive {source_path}: {message}")]
    Archive {
        instruction: String,
        source_path: String,
        message: String,
    },

    /// No command is registered for the instruction name
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),

    /// The build was cancelled while an instruction was in flight
    #[error("Build cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl BuildError {
    /// Wrap an engine failure with the name of the instruction that issued the call.
    pub fn engine(instruction: impl Into<String>, err: impl std::fmt::Display) -> Self {
        BuildError::Engine {
            instruction: instruction.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid_args(instruction: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::InvalidArguments {
            instruction: instruction.into(),
            message: message.into(),
        }
    }

    pub fn precondition(instruction: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::Precondition {
            instruction: instruction.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for BuildError {
    fn from(err: serde_yaml::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

/// Errors returned by an engine client implementation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The daemon rejected or failed the request
    #[error("daemon error: {0}")]
    Daemon(String),

    /// Transport or stream I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A test double was called without a scripted response
    #[error("no scripted response for {0}")]
    NotScripted(String),
}

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_not_found_display() {
        let error = BuildError::ImageNotFound {
            instruction: "FROM".to_string(),
            image: "not-existing".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "FROM: Failed to inspect image after pull: not-existing"
        );
    }

    #[test]
    fn test_engine_error_wraps_instruction() {
        let error = BuildError::engine("RUN", EngineError::Daemon("no such image".to_string()));
        assert_eq!(error.to_string(), "RUN: daemon error: no such image");
    }

    #[test]
    fn test_precondition_display() {
        let error = BuildError::precondition("COMMIT", "Nothing to commit");
        assert_eq!(error.to_string(), "COMMIT: Nothing to commit");
    }

    #[test]
    fn test_cleanup_error_display() {
        let error = BuildError::Cleanup {
            instruction: "COMMIT".to_string(),
            container_id: "456".to_string(),
            image_id: "789".to_string(),
            message: "device busy".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.starts_with("COMMIT: "));
        assert!(msg.contains("456"));
        assert!(msg.contains("789"));
        assert!(msg.contains("device busy"));
    }

    #[test]
    fn test_invalid_args_display() {
        let error = BuildError::invalid_args("ENV", "expected key/value pairs");
        assert_eq!(error.to_string(), "ENV: expected key/value pairs");
    }

    #[test]
    fn test_unknown_instruction_display() {
        let error = BuildError::UnknownInstruction("HEALTHCHECK".to_string());
        assert_eq!(error.to_string(), "Unknown instruction: HEALTHCHECK");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let build_error: BuildError = io_error.into();
        assert!(matches!(build_error, BuildError::IoError(_)));
        assert!(build_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let build_error: BuildError = result.unwrap_err().into();
        assert!(matches!(build_error, BuildError::SerializationError(_)));
    }

    #[test]
    fn test_engine_not_scripted_display() {
        let error = EngineError::NotScripted("pull_image".to_string());
        assert_eq!(error.to_string(), "no scripted response for pull_image");
    }
}
