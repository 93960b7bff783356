//! Model client module for AI inference.

mod client;

pub use client::{
    ChatModel, ChatRequest, MessageBuilder, ModelClient, ModelConfig, ModelError,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
