//! Flarechat - streaming chat with inline image generation
//!
//! Chat turns stream from a Workers AI model through the AI gateway. The
//! model can ask for an image either with a structured tool event or with an
//! inline `<tool_call>` directive in its text; either way the call is run
//! against the image generation workflow and the result is attached to the
//! assistant message.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)] // lib target API

pub mod config;
pub mod conversation;
pub mod directive;
pub mod error;
pub mod image;
pub mod llm;
mod system_prompt;
pub mod tools;
pub mod turn;

#[cfg(test)]
mod testing;
