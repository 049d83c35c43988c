//! Error types for the observed container and the profiling bridge.

use thiserror::Error;

/// Dependency injection errors
///
/// Raised by the observed container while resolving services. The profiling
/// bridge never raises these itself; it only reports them in
/// resolve-operation ending messages through [`DiError::kind_name`] and the
/// `Display` output.
///
/// # Examples
///
/// ```rust
/// use ferrous_whitebox::{ContainerBuilder, DiError, Resolver};
///
/// let container = ContainerBuilder::new().build();
/// match container.root().resolve::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered and no registration source supplied it
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// A fallible factory returned an error
    #[error("Activation of {component} failed: {message}")]
    Activation {
        component: &'static str,
        /// Type name of the error the factory returned
        kind: &'static str,
        message: String,
    },
    /// A factory panicked; the panic is re-raised after the operation ends
    #[error("Factory for {component} panicked: {message}")]
    FactoryPanic {
        component: &'static str,
        message: String,
    },
    /// Resolution attempted on a scope that already ended
    #[error("Lifetime scope has already ended")]
    ScopeEnded,
}

impl DiError {
    /// Qualified kind of the failure, as reported to profiling consumers.
    ///
    /// Activation failures report the type name of the error the factory
    /// returned; every other variant reports its own path.
    ///
    /// ```rust
    /// use ferrous_whitebox::DiError;
    ///
    /// assert_eq!(
    ///     DiError::NotFound("Foo").kind_name(),
    ///     "ferrous_whitebox::error::DiError::NotFound"
    /// );
    /// let failed = DiError::Activation {
    ///     component: "Foo",
    ///     kind: "std::io::error::Error",
    ///     message: "disk on fire".to_string(),
    /// };
    /// assert_eq!(failed.kind_name(), "std::io::error::Error");
    /// ```
    pub fn kind_name(&self) -> &'static str {
        match self {
            DiError::NotFound(_) => concat!(module_path!(), "::DiError::NotFound"),
            DiError::TypeMismatch(_) => concat!(module_path!(), "::DiError::TypeMismatch"),
            DiError::Circular(_) => concat!(module_path!(), "::DiError::Circular"),
            DiError::Activation { kind, .. } => kind,
            DiError::FactoryPanic { .. } => concat!(module_path!(), "::DiError::FactoryPanic"),
            DiError::ScopeEnded => concat!(module_path!(), "::DiError::ScopeEnded"),
        }
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;

/// Failures of an outbound message queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The consumer side is gone
    #[error("message queue is closed")]
    Closed,
    /// A bounded queue had no room for the message
    #[error("message queue is full")]
    Full,
    /// The underlying writer failed
    #[error("message queue write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The message could not be encoded
    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by the profiling bridge itself.
#[derive(Debug, Error)]
pub enum WhiteboxError {
    /// The bridge was driven in an order its attach sequence does not allow
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// A message could not be handed to the outbound queue
    #[error(transparent)]
    Delivery(#[from] QueueError),
    /// Options could not be loaded
    #[error("invalid whitebox configuration: {0}")]
    Config(String),
}

/// Result type for bridge operations
pub type WhiteboxResult<T> = Result<T, WhiteboxError>;
