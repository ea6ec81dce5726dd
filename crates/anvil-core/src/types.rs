//! Request and result types for the compile pipeline.

use crate::error::{Error, Result};

/// One inbound compile request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    /// Sketch source text, written verbatim into the workspace.
    pub source: String,

    /// Board profile (fully qualified board name), opaque to this crate.
    pub board: String,

    /// Libraries to install before compiling, in order.
    pub libraries: Vec<String>,
}

impl CompileRequest {
    /// Create a request without libraries.
    pub fn new(source: impl Into<String>, board: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            board: board.into(),
            libraries: Vec::new(),
        }
    }

    /// Set the libraries to install before compiling.
    pub fn with_libraries<I, S>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries = libraries.into_iter().map(Into::into).collect();
        self
    }

    /// Check the request before any resource is allocated for it.
    ///
    /// Source and board must both be non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() || self.board.is_empty() {
            return Err(Error::Validation("code and board required".to_string()));
        }
        Ok(())
    }
}

/// The artifact produced by a successful build, read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// File name of the artifact inside the build output tree.
    pub filename: String,

    /// Raw artifact contents.
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_complete_request() {
        let request = CompileRequest::new("void setup() {}", "arduino:avr:uno");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        for request in [
            CompileRequest::new("", "arduino:avr:uno"),
            CompileRequest::new("void setup() {}", ""),
            CompileRequest::default(),
        ] {
            assert!(matches!(request.validate(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_with_libraries_keeps_order() {
        let request = CompileRequest::new("x", "y").with_libraries(["Servo", "Wire", "Servo"]);
        assert_eq!(request.libraries, vec!["Servo", "Wire", "Servo"]);
    }
}
