//! Coverage provider abstraction
//!
//! This module describes the street-level imagery providers (Google, Bing,
//! Yandex, Apple, Naver, Já.is) as data consumed by one generic engine, plus
//! the HTTP transport used to reach them.
//!
//! # Factory Pattern
//!
//! For centralized spec creation, use the [`ProviderFactory`]:
//!
//! ```
//! use streetradar::provider::{ProviderFactory, ProviderKind};
//!
//! let factory = ProviderFactory::default();
//! let bing = factory.spec(ProviderKind::Bing);
//! assert!(bing.url_template.contains("{quadkey}"));
//! ```

mod factory;
mod http;
mod types;

pub use factory::{default_spec, ProviderFactory};
pub use http::{
    AsyncHttpClient, AsyncReqwestClient, HttpResponse, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use types::{CoordTransform, ProviderError, ProviderKind, ProviderSpec, RenderMode};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
