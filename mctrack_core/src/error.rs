//! Error types for the MCTrack viewer core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading data or refreshing the scene.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Dataset root or results file does not exist
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// None of the attempted dataset versions could be loaded
    #[error("Unsupported dataset version (tried {})", .tried.join(", "))]
    UnsupportedDatasetVersion { tried: Vec<String> },

    /// File exists but its contents do not match the expected layout
    #[error("Malformed file {}: {reason}", .path.display())]
    MalformedFile { path: PathBuf, reason: String },

    /// The selected scene has no samples (or the dataset has no scenes)
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Frame index past the end of the sample chain
    #[error("Frame {index} out of range ({len} frames)")]
    OutOfRange { index: usize, len: usize },

    /// A token references a record missing from its table
    #[error("Unknown {table} token: {token}")]
    UnknownToken { table: &'static str, token: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rendering backend refused a geometry operation
    #[error("Render error: {0}")]
    Render(String),
}

impl ViewerError {
    /// Creates a malformed-file error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a render error.
    pub fn render(msg: impl std::fmt::Display) -> Self {
        Self::Render(msg.to_string())
    }

    /// Whether this error is shown to the user as a dialog rather than
    /// recovered locally.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::MalformedFile { .. } | Self::Render(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ViewerError::UnsupportedDatasetVersion {
            tried: vec!["v1.0-trainval".into(), "v1.0-mini".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported dataset version (tried v1.0-trainval, v1.0-mini)"
        );

        let err = ViewerError::OutOfRange { index: 4, len: 4 };
        assert_eq!(err.to_string(), "Frame 4 out of range (4 frames)");
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(ViewerError::PathNotFound("/nope".into()).is_user_facing());
        assert!(ViewerError::EmptyDataset("scene-0001".into()).is_user_facing());
        assert!(!ViewerError::malformed("a.pcd.bin", "short").is_user_facing());
    }
}
