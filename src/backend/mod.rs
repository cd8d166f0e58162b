//! Production history backends.

mod http;
mod wire;

pub use http::HttpHistoryBackend;
