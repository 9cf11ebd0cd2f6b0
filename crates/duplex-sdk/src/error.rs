//! Aggregate error for SDK calls.

use duplex_core::{ConfigError, ResponseError};
use duplex_data::FetchError;
use duplex_render::RenderError;

/// Errors surfaced by [`Session`](crate::Session) and [`Exchange`](crate::Exchange).
#[derive(Debug, thiserror::Error)]
pub enum DuplexError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid bootstrap payload: {0}")]
    Bootstrap(#[from] serde_json::Error),
}

impl DuplexError {
    /// Status code a host should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Fetch(e) => e.status_code,
            _ => 500,
        }
    }
}
