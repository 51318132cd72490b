/// Errors that stop a lint run.
///
/// Problems found in the document are never reported this way; they are
/// delivered as [`Message`](crate::Message)s. A `LintError` means the
/// linter itself could not do its job.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    /// I/O error reading the document or a service file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON in a vocabulary file
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A service file could not be used
    #[error("Service configuration error: {0}")]
    ServiceError(String),

    /// Text decoding failed before the XML parser could report it
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<crate::sax::SaxError> for LintError {
    fn from(err: crate::sax::SaxError) -> Self {
        match err {
            crate::sax::SaxError::Io(e) => LintError::IoError(e),
            crate::sax::SaxError::Encoding(msg) => LintError::EncodingError(msg),
        }
    }
}
