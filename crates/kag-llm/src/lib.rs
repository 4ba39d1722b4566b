//! Language-model transport plus the two components built on it: answer
//! generation and query expansion.

mod client;
mod expansion;
mod generator;

pub use client::OpenAiChatClient;
pub use expansion::{parse_expansion, QueryExpander, EXPANSION_INSTRUCTION};
pub use generator::{AnswerGenerator, FALLBACK_ANSWER};
