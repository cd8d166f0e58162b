//! Workflow history: data model, backend capability, and the streaming engine.

pub mod backend;
pub mod encoder;
pub mod stream;
pub mod types;

pub use backend::HistoryBackend;
pub use encoder::{Element, JsonArrayWriter};
pub use stream::{HistoryByteStream, RawHistory, RawHistoryBuilder};
pub use types::{
    ContinuationToken, EventAttributes, HistoryEvent, HistoryPage, HistoryPageRequest,
    WorkflowIdentity,
};
