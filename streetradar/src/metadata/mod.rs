//! Tile metadata resolution.
//!
//! Providers that publish a TileJSON descriptor advertise their tile URL
//! template and zoom bounds through it. The [`MetadataResolver`] fetches that
//! descriptor once per provider, caches it for the resolver's lifetime, and
//! coalesces concurrent requests onto a single HTTP fetch.
//!
//! # Architecture
//!
//! ```text
//! Tile task A ─┐
//!              │                                 HTTP
//! Tile task B ─┼──► MetadataResolver ──────► tiles.json
//!              │      │  cache hit?              │
//! Tile task C ─┘      │  in flight? subscribe    │
//!                     ▼                          ▼
//!               [A, B, C all receive      [one request]
//!                the same result]◄───────────────┘
//! ```

mod resolver;
mod tilejson;

pub use resolver::{MetadataResolver, ResolverStats};
pub use tilejson::TileJsonMetadata;

use crate::provider::ProviderKind;
use thiserror::Error;

/// Errors from resolving provider metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    /// The descriptor could not be retrieved or parsed.
    #[error("failed to fetch metadata for {provider}: {reason}")]
    Fetch {
        provider: ProviderKind,
        reason: String,
    },

    /// The descriptor was retrieved but does not describe a usable archive.
    #[error("invalid metadata for {provider}: {reason}")]
    Invalid {
        provider: ProviderKind,
        reason: String,
    },

    /// The provider has no metadata endpoint configured.
    #[error("provider {0} has no metadata endpoint")]
    NoEndpoint(ProviderKind),

    /// The fetch this caller was waiting on was dropped before completing.
    #[error("metadata fetch for {0} was abandoned")]
    Abandoned(ProviderKind),
}
