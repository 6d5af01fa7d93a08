use thiserror::Error as ThisError;

/// Every way a line of input can fail
///
/// Any error aborts the current line. Assignments that already ran stay in effect.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Invalid function name: {0}")]
    InvalidFunctionName(String),
    #[error("Empty sequence")]
    EmptySequence,
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl Error {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn test_error_display() {
    assert_eq!(
        Error::UnboundVariable("y".to_string()).to_string(),
        "Unbound variable: y"
    );
    assert_eq!(Error::EmptySequence.to_string(), "Empty sequence");
    assert_eq!(
        Error::malformed("division by zero").to_string(),
        "Malformed input: division by zero"
    );
}
