//! Core module - bridge messages and the processing pipeline.

pub mod message;
pub mod pipeline;

pub use message::Message;
pub use pipeline::Pipeline;
