use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while running a unit. All variants except `EngineFault`
/// are language-level and observable by script; `EngineFault` means the
/// machine or a provider broke its own contract.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("ReferenceError: `{name}` is not defined")]
    UndefinedReference { name: String },
    #[error("ReferenceError: assignment to undeclared `{name}` in strict code")]
    StrictAssignment { name: String },
    #[error("TypeError: {message}")]
    TypeError { message: String },
    #[error("uncaught: {value}")]
    Thrown { value: String },
    #[error("engine fault: {message}")]
    EngineFault { message: String },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> RuntimeError {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }
}
