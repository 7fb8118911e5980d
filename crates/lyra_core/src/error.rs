use thiserror::Error;

#[derive(Debug, Error)]
pub enum LyraError {
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl LyraError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type LyraResult<T> = Result<T, LyraError>;

#[cfg(test)]
mod tests {
    use super::LyraError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = LyraError::validation("bad");
        assert!(matches!(err, LyraError::Validation { .. }));
        let err = LyraError::not_found("missing");
        assert!(matches!(err, LyraError::NotFound { .. }));
        let err = LyraError::storage("disk");
        assert!(matches!(err, LyraError::Storage { .. }));
        let err = LyraError::config("path");
        assert!(matches!(err, LyraError::Config { .. }));
    }
}
