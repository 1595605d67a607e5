//! Error types for remote page operations.

use std::fmt;

use thiserror::Error;

/// The remote call an error originated from. Every surfaced failure names
/// its operation so callers can tell which side effect was in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    CreatePage,
    RetrievePage,
    ListChildren,
    AppendChildren,
    DeleteBlock,
    Search,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePage => "create_page",
            Operation::RetrievePage => "retrieve_page",
            Operation::ListChildren => "list_children",
            Operation::AppendChildren => "append_children",
            Operation::DeleteBlock => "delete_block",
            Operation::Search => "search",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure from the remote page client.
///
/// Rate-limit responses are retried inside the client and never surface
/// here; what does surface is terminal for the operation.
#[derive(Debug, Error)]
pub enum NotionError {
    /// The API answered with an error status.
    #[error("{operation} failed with HTTP {status}: {message}")]
    Api {
        operation: Operation,
        status: u16,
        /// Notion's machine-readable error code, when present.
        code: Option<String>,
        message: String,
    },

    /// The request never completed (connect, timeout, TLS, body decode).
    #[error("{operation} transport error: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose body does not match the documented schema.
    #[error("{operation} returned an unexpected response: {detail}")]
    Shape { operation: Operation, detail: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },
}

impl NotionError {
    /// The operation this error originated from, when there is one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            NotionError::Api { operation, .. }
            | NotionError::Transport { operation, .. }
            | NotionError::Shape { operation, .. } => Some(*operation),
            NotionError::Build { .. } => None,
        }
    }
}
