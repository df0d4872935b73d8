//! Error types for the Waylay engine

use crate::value::Exception;

/// Result of dispatching a method or running a hook body
pub type CallResult<T = crate::value::Value> = Result<T, CallError>;

/// Result of a single lifecycle hook
pub type HookResult = Result<(), CallError>;

/// Errors surfaced to the caller of a dispatched method
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// An exception raised by a method body or a hook.
    ///
    /// Carried through interception layers unchanged; compare with
    /// [`CallError::is_same`] to check identity.
    #[error("{0}")]
    Raised(Exception),

    /// An `around` hook returned without calling `run`
    #[error("run not called from `around` hook of `{method}`")]
    RunNotCalled {
        /// Name of the intercepted method
        method: String,
    },

    /// No method with this name is reachable from the receiver
    #[error("undefined method `{method}` for {receiver}")]
    NoMethod {
        /// Method name that failed to resolve
        method: String,
        /// Description of the receiver
        receiver: String,
    },

    /// Nested dispatch exceeded the configured depth
    #[error("stack level too deep ({depth} nested calls)")]
    StackOverflow {
        /// Depth at which dispatch was refused
        depth: usize,
    },
}

impl CallError {
    /// Convenience constructor for a `RuntimeError` exception
    pub fn runtime(message: impl Into<String>) -> Self {
        CallError::Raised(Exception::runtime(message))
    }

    /// The raised exception, if this error carries one
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            CallError::Raised(exception) => Some(exception),
            _ => None,
        }
    }

    /// Check whether two errors are the same failure.
    ///
    /// Raised exceptions compare by identity; engine errors compare by content.
    pub fn is_same(&self, other: &CallError) -> bool {
        match (self, other) {
            (CallError::Raised(a), CallError::Raised(b)) => a.ptr_eq(b),
            (CallError::RunNotCalled { method: a }, CallError::RunNotCalled { method: b }) => a == b,
            (
                CallError::NoMethod { method: a, receiver: ra },
                CallError::NoMethod { method: b, receiver: rb },
            ) => a == b && ra == rb,
            (CallError::StackOverflow { depth: a }, CallError::StackOverflow { depth: b }) => a == b,
            _ => false,
        }
    }
}

impl From<Exception> for CallError {
    fn from(exception: Exception) -> Self {
        CallError::Raised(exception)
    }
}

/// Errors raised while registering interceptors or defining methods
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    /// The method does not exist on the target, directly or by inheritance
    #[error("undefined method `{method}` for {target}")]
    MethodNotFound {
        /// Description of the install target
        target: String,
        /// Missing method name
        method: String,
    },

    /// The class id does not belong to this runtime
    #[error("unknown class id {0}")]
    UnknownClass(usize),
}

/// Errors converting install options
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    /// Options must be given as a JSON object
    #[error("options must be a JSON object, got {0}")]
    NotAnObject(String),
}

/// Errors loading a runtime configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration text is not valid JSON for `RuntimeConfig`
    #[error("invalid runtime config: {0}")]
    Parse(#[from] serde_json::Error),
}
