//! Error types for the stylec compiler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSS error in {file} at byte {offset} (declaration `{name}`): {message}")]
    Css {
        file: String,
        name: String,
        offset: usize,
        message: String,
    },

    #[error("Language setup error: {message}")]
    Language { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Source map error: {message}")]
    SourceMap { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn css(
        file: impl Into<String>,
        name: impl Into<String>,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Css {
            file: file.into(),
            name: name.into(),
            offset,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for errors that must fail the host build for the file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Css { .. } | Self::Io(_) | Self::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_error_names_file_declaration_and_offset() {
        let err = CompilerError::css("src/Button.tsx", "Button", 42, "unexpected token");
        let message = err.to_string();
        assert!(message.contains("src/Button.tsx"));
        assert!(message.contains("`Button`"));
        assert!(message.contains("byte 42"));
        assert!(message.contains("unexpected token"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_error_is_not_fatal() {
        let err = CompilerError::config("bad prefix");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Configuration error: bad prefix");
    }
}
