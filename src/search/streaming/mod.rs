//! Streaming search: wire frame decoding and the ingestion engine.

mod engine;
mod frame;

pub use engine::{SearchEngine, SearchHandle};
pub use frame::{FrameDecoder, StreamEnvelope, StreamMode};
