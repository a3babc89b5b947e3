//! Error taxonomy for tesync-core.

use std::path::PathBuf;

/// Errors produced while validating a single input record.
///
/// These never abort a run on their own: the offending record is skipped
/// and reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("record is missing required field: {field}")]
    MissingField { field: String },

    #[error("unknown test type: {0}")]
    UnknownTestType(String),

    #[error("agents label must look like `label --> account group`, got: {0}")]
    MalformedAgentsLabel(String),

    #[error("unknown account group: {0}")]
    UnknownAccountGroup(String),

    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Fatal errors for a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("resource not found: {resource_type}.{resource_name}")]
    ResourceNotFound {
        resource_type: String,
        resource_name: String,
    },

    #[error(
        "could not append to {}; already appended: {}",
        .failed.display(),
        display_paths(.appended)
    )]
    ImportIncomplete {
        failed: PathBuf,
        appended: Vec<PathBuf>,
        #[source]
        source: Box<SyncError>,
    },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for tesync-core operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_position() {
        let err = SyncError::Parse {
            line: 3,
            column: 7,
            message: "expected `=`".to_string(),
        };
        assert_eq!(err.to_string(), "parse error at 3:7: expected `=`");
    }

    #[test]
    fn resource_not_found_names_the_address() {
        let err = SyncError::ResourceNotFound {
            resource_type: "thousandeyes_http_server".to_string(),
            resource_name: "checkout".to_string(),
        };
        assert!(err
            .to_string()
            .contains("thousandeyes_http_server.checkout"));
    }

    #[test]
    fn incomplete_import_lists_written_files() {
        let err = SyncError::ImportIncomplete {
            failed: PathBuf::from("tf/imports.tf"),
            appended: vec![PathBuf::from("tf/variables.tf"), PathBuf::from("tf/providers.tf")],
            source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into()),
        };
        assert_eq!(
            err.to_string(),
            "could not append to tf/imports.tf; already appended: tf/variables.tf, tf/providers.tf"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_error_converts() {
        let err: SyncError = ValidationError::UnknownTestType("ping".to_string()).into();
        assert!(err.to_string().contains("unknown test type: ping"));
    }
}
