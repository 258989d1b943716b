//! Error types for the common crate

use thiserror::Error;
use uuid::Uuid;

use crate::component::{ComponentState, ComponentTrigger};

/// Message bus routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Endpoint '{0}' already registered")]
    EndpointAlreadyRegistered(String),

    #[error("No handler registered at endpoint '{0}'")]
    NoEndpoint(String),

    #[error("Duplicate request correlation id {0}")]
    DuplicateCorrelationId(Uuid),

    #[error("No pending request for correlation id {0}")]
    UnknownCorrelationId(Uuid),

    #[error("Handler '{handler}' failed: {message}")]
    HandlerFailed { handler: String, message: String },
}

/// Component lifecycle errors
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Invalid trigger {trigger:?} from state {state:?}")]
    InvalidTransition {
        state: ComponentState,
        trigger: ComponentTrigger,
    },

    /// A lifecycle hook failed; the component stays in `state`
    #[error("{component} {trigger:?} hook failed in state {state:?}: {source}")]
    HookFailed {
        component: String,
        trigger: ComponentTrigger,
        state: ComponentState,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced by [`crate::RetryManager`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: E,
    },

    #[error("{operation} failed with non-retryable error: {error}")]
    NonRetryable { operation: String, error: E },
}
