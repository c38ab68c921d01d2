pub mod api;

pub use api::{
    ApiMessage, BalanceResponse, ChatChunk, ChatRequest, StreamEvent, StreamOptions, WireUsage,
};
