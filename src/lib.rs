//! Keeps a drag-reorderable list of color tokens consistent with the host's
//! persisted token settings.
//!
//! - [`normalize`] turns the host map into render order
//! - [`engine`] verifies rendered rows, resets on drift, binds drag and saves
//! - [`bridge`] is the settings store seam, [`host`] the rendered-page seam
//! - [`drag`] wraps the drag capability supplied by the embedder

#![forbid(unsafe_code)]

pub mod bridge;
pub mod color;
pub mod config;
pub mod constants;
pub mod drag;
pub mod engine;
pub mod error;
pub mod host;
pub mod normalize;
pub mod token;

pub use engine::{Engine, EngineChannels, Phase};
pub use error::Diagnostic;
pub use normalize::NormalizedOrder;
pub use token::{ColorToken, OrderedItemMap, TokenId, TokenSettings};
