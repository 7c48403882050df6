//! Error types for dependency injection and component loading

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that can occur while loading components or resolving providers.
///
/// All of these are configuration problems raised before `start()`; they
/// abort the load and are expected to fail the process fast.
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A required dependency has no provider in the injector chain
    #[error("Can't find provider of \"{token}\" at {{{position}[{index}]}}")]
    ProviderNotFound {
        token: String,
        position: String,
        index: usize,
    },

    /// Resolution revisited a token that is already being resolved
    #[error("Circular dependency detected: {path}")]
    CircularDependency { path: String },

    /// A component carries a subsystem token nobody registered
    #[error("Can't find loader for component \"{component}\"")]
    LoaderNotFound { component: String },

    /// A class provider definition points at something other than a service
    #[error("Property 'useClass' of ClassProviderDef must be a \"TpWorker\", received {received}.")]
    NotWorker { received: String },

    /// `bootstrap` was given something other than a root component
    #[error("{received} is not a \"TpRoot\"")]
    NotEntry { received: String },

    /// A multi value was registered over a single binding
    #[error("Can't append multi value to \"{token}\", it's already bound to a single provider")]
    MultiConflict { token: String },

    /// A constructor read an argument that was not resolved
    #[error("Missing argument at {{{position}[{index}]}}")]
    MissingArgument { position: String, index: usize },

    /// A constructor read an argument as the wrong type
    #[error("Argument {index} is not a {expected}")]
    TypeMismatch { expected: &'static str, index: usize },

    /// A constructor or factory failed
    #[error("Failed to create {type_name}: {reason}")]
    CreationFailed { type_name: String, reason: String },

    /// The injector tree behind a self-reference was dropped
    #[error("Injector has been dropped")]
    InjectorDropped,

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DiError {
    /// Create a ProviderNotFound error
    #[inline]
    pub fn not_found(token: impl Into<String>, position: impl Into<String>, index: usize) -> Self {
        Self::ProviderNotFound {
            token: token.into(),
            position: position.into(),
            index,
        }
    }

    /// Create a CreationFailed error for type `T`
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: crate::token::short_type_name(std::any::type_name::<T>()).to_string(),
            reason: reason.into(),
        }
    }

    /// Create a CircularDependency error from a rendered path
    #[inline]
    pub fn circular(path: impl Into<String>) -> Self {
        Self::CircularDependency { path: path.into() }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

/// Error raised by a lifecycle hook. Logged by `TpLoader`, never propagated.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a lifecycle hook.
pub type HookResult = std::result::Result<(), HookError>;
