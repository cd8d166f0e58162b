//! # rawhistory
//!
//! Streams a workflow execution's history, paginated from a backend, to an HTTP
//! client as one JSON array, without buffering the whole history and without
//! aborting the response when a fetch fails midway.
//!
//! - [`decode`]: strict percent-decoding of the workflow id path segment
//! - [`history`]: data model, the [`history::HistoryBackend`] capability, and the
//!   [`history::RawHistory`] streaming engine
//! - [`backend`]: the HTTP/JSON gateway implementation of the backend capability
//! - [`server`]: axum router and request adapter
//! - [`config`] / [`telemetry`]: environment configuration and tracing setup
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rawhistory::{backend::HttpHistoryBackend, config::ServerConfig, server};
//!
//! let config = ServerConfig::from_env()?;
//! let backend = Arc::new(HttpHistoryBackend::new(config.backend.clone())?);
//! server::serve(&config, backend).await?;
//! ```

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod decode;
pub mod error;
pub mod history;
pub mod server;
pub mod telemetry;

pub use error::{BuildError, ConfigError, HistoryError};

/// Common imports.
pub mod prelude {
    pub use crate::backend::HttpHistoryBackend;
    pub use crate::config::{BackendConfig, ServerConfig};
    pub use crate::decode::{DecodeError, decode_path_segment};
    pub use crate::error::{BuildError, ConfigError, HistoryError};
    pub use crate::history::{
        ContinuationToken, EventAttributes, HistoryBackend, HistoryEvent, HistoryPage,
        HistoryPageRequest, RawHistory, WorkflowIdentity,
    };
    pub use crate::server::{ApiError, RAW_HISTORY_ROUTE, router};
}
