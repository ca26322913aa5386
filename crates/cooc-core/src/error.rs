use std::fmt;

/// Failures raised by the pure computation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A malformed input line. `line` is 1-based.
    Format { line: usize, message: String },
    /// An invalid parameter or name supplied by the caller.
    Config(String),
    /// Two upstream artifacts disagree with each other.
    Consistency(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Format { line, message } => {
                write!(f, "formatting error on line {line}: {message}")
            }
            CoreError::Config(msg) => write!(f, "configuration error: {msg}"),
            CoreError::Consistency(msg) => write!(f, "consistency error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
