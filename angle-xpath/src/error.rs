use strum_macros::{Display, EnumMessage};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumMessage)]
pub enum EvaluationCause {
    /// An operand or context item has the wrong type.
    #[strum(message = "wrong operand or context item type")]
    Type,
    /// A function was called with the wrong number of arguments.
    #[strum(message = "wrong number of arguments")]
    Arity,
    /// A value cannot be cast to the requested type.
    #[strum(message = "value cannot be cast")]
    Cast,
    /// A variable or function name is not defined.
    #[strum(message = "undefined name")]
    Undefined,
    /// Division by zero.
    #[strum(message = "division by zero")]
    Zero,
    /// The expression uses a feature outside the supported surface.
    #[strum(message = "unsupported expression")]
    Unsupported,
    /// A result was produced where none is allowed.
    #[strum(message = "discarded result")]
    Discard,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The expression does not conform to the grammar.
    #[error("compile error: {0}")]
    Compile(String),
    /// A dynamic error raised while evaluating.
    #[error("evaluation error ({cause}): {message}")]
    Evaluation {
        cause: EvaluationCause,
        message: String,
    },
    /// I/O performed by a built-in failed.
    #[error("io error: {0}")]
    Io(String),
    /// The cancellation token fired.
    #[error("evaluation cancelled")]
    Cancelled,
}

impl Error {
    pub fn evaluation(cause: EvaluationCause, message: impl Into<String>) -> Self {
        Error::Evaluation {
            cause,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Type, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Arity, message)
    }

    pub fn cast(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Cast, message)
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Undefined, message)
    }

    pub fn zero(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Zero, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::evaluation(EvaluationCause::Unsupported, message)
    }

    /// The cause of an evaluation error, if this is one.
    pub fn cause(&self) -> Option<EvaluationCause> {
        match self {
            Error::Evaluation { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    /// Whether `xsl:try` may divert this error to a catch branch.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
