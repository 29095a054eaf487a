//! Reconciliation diagnostics
//!
//! Every failure the engine can run into while reconciling is recoverable.
//! These values are logged and kept in the engine history; none of them stop
//! the event loop.

use thiserror::Error;

use crate::token::TokenId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// Rendered row count disagrees with the expected count
    #[error("rendered {on_screen} rows but the configuration has {expected} tokens")]
    StructuralMismatch { on_screen: usize, expected: usize },

    /// A row displays a different color than the token at its position
    #[error("row {index} ({id}) shows {actual:?}, expected {expected}")]
    ContentMismatch {
        index: usize,
        id: TokenId,
        expected: String,
        actual: Option<String>,
    },

    /// A token color is not in the `rgba(r,g,b,a)` encoding
    #[error("token {id} has an unreadable color {rgba:?}")]
    InvalidColor { id: TokenId, rgba: String },

    /// The drag capability could not be constructed
    #[error("drag capability unavailable: {0}")]
    MissingDependency(String),

    /// A save referenced an id that is no longer in the configuration
    #[error("token {0} is no longer in the configuration, skipped")]
    StaleReference(TokenId),

    /// A reset was requested while another one was still cooling down
    #[error("reset already in flight, request coalesced")]
    ReentrantReset,
}

impl Diagnostic {
    /// Emit the diagnostic at the level matching its severity
    pub fn log(&self) {
        match self {
            Diagnostic::StructuralMismatch { on_screen, expected } => {
                tracing::error!(on_screen, expected, "{self}");
            }
            Diagnostic::ReentrantReset => tracing::debug!("{self}"),
            _ => tracing::warn!("{self}"),
        }
    }
}
