//! OpenAI client shared by the prescription and consultation cells.

pub mod openai;

pub use openai::{AiError, ChatMessage, OpenAiClient, RealtimeSession};
