use serde::Serialize;
use thiserror::Error;

/// Errors reported by a [`Session`](crate::session::Session).
///
/// Load failures are fatal for the load that raised them; everything resolved per
/// resource (`ResourceNotFound`) is local and never tears down what is rendered.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode archive: {0}")]
    ArchiveDecode(String),

    #[error("no entry point document ending in `{0}` found in archive")]
    MissingEntryPoint(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("load was superseded by a newer archive")]
    Superseded,

    #[error("session has been torn down")]
    TornDown,

    #[error("failed to render `{path}`: {message}")]
    Render { path: String, message: String },
}

impl FrameError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::InvalidInput(_) => "invalid-input",
            FrameError::ArchiveDecode(_) => "archive-decode",
            FrameError::MissingEntryPoint(_) => "missing-entry-point",
            FrameError::ResourceNotFound(_) => "resource-not-found",
            FrameError::Superseded => "superseded",
            FrameError::TornDown => "torn-down",
            FrameError::Render { .. } => "render",
        }
    }

    pub(crate) fn decode(err: anyhow::Error) -> Self {
        FrameError::ArchiveDecode(format!("{err:#}"))
    }
}

/// Result of the load entrypoint, in the shape reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl LoadOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
        }
    }

    pub fn failed(err: &FrameError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            code: Some(err.code()),
        }
    }
}

impl<T> From<&Result<T, FrameError>> for LoadOutcome {
    fn from(result: &Result<T, FrameError>) -> Self {
        match result {
            Ok(_) => LoadOutcome::ok(),
            Err(err) => LoadOutcome::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            FrameError::MissingEntryPoint("index.html".into()).code(),
            "missing-entry-point"
        );
        assert_eq!(FrameError::Superseded.code(), "superseded");
    }

    #[test]
    fn test_outcome_serialization() {
        let ok: Result<(), FrameError> = Ok(());
        assert_eq!(
            serde_json::to_string(&LoadOutcome::from(&ok)).unwrap(),
            r#"{"success":true}"#
        );

        let failed: Result<(), FrameError> =
            Err(FrameError::MissingEntryPoint("index.html".into()));
        let json = serde_json::to_value(LoadOutcome::from(&failed)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "missing-entry-point");
        assert!(json["error"].as_str().unwrap().contains("index.html"));
    }
}
