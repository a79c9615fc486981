use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the document model.
///
/// Edit failures (`InvalidArgument`, `InvalidIndex`, `NotFound`) leave the
/// document untouched. Load failures (`Format`, `Json`, `Io`) abort the load
/// before anything is installed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("index {index} out of range (length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("format error: {message}")]
    Format { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Whether the error comes from loading a document rather than editing one.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::Json(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn invalid_index_message_names_range() {
        let err = Error::InvalidIndex { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range (length 2)");
        assert!(!err.is_load_error());
    }

    #[test]
    fn format_errors_are_load_errors() {
        assert!(Error::format("bad version").is_load_error());
    }
}
