//! Inline tool-call directives
//!
//! Detection of `<tool_call>` spans in streamed text and parsing of their
//! payload into a typed call.

pub mod detector;
pub mod literal;
mod parser;

pub use detector::{Detection, DirectiveDetector, END_DELIMITER, START_DELIMITER};
pub use literal::{parse_literal, LiteralError};
pub use parser::{parse_inline, parse_structured, ToolCallDescriptor, DEFAULT_TOOL_NAME};
