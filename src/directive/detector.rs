//! Incremental directive detection
//!
//! Text fragments are appended to a buffer as they arrive. Until the start
//! delimiter shows up the buffer is plain narration. From the start delimiter
//! on, the buffer holds the directive and nothing is published until the end
//! delimiter closes it.

/// Opens an inline directive
pub const START_DELIMITER: &str = "<tool_call>";
/// Closes an inline directive
pub const END_DELIMITER: &str = "</tool_call>";

/// Outcome of feeding one fragment to the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No directive so far; carries the whole accumulated text
    Narration(String),
    /// The start delimiter appeared; carries the final narration
    Opened { narration: String },
    /// Inside a directive, end delimiter not seen yet
    Pending,
    /// The end delimiter appeared. `narration` is set when the start
    /// delimiter arrived in the same fragment.
    Closed {
        narration: Option<String>,
        payload: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Narrating,
    Open,
    Closed,
}

/// Accumulates fragments and tracks the directive span
#[derive(Debug, Clone)]
pub struct DirectiveDetector {
    buffer: String,
    phase: Phase,
}

impl Default for DirectiveDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveDetector {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            phase: Phase::Narrating,
        }
    }

    /// Whether a start delimiter has been seen without its end
    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Accumulated text. While narrating this is the live content; once a
    /// directive opened it starts at the start delimiter.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Feed the next text fragment
    pub fn push(&mut self, fragment: &str) -> Detection {
        match self.phase {
            Phase::Narrating => {
                self.buffer.push_str(fragment);
                let Some((before, after)) = self.buffer.split_once(START_DELIMITER) else {
                    return Detection::Narration(self.buffer.clone());
                };

                let narration = before.trim_end().to_string();
                self.buffer = format!("{START_DELIMITER}{after}");
                self.phase = Phase::Open;

                match self.closed_payload() {
                    Some(payload) => {
                        self.phase = Phase::Closed;
                        Detection::Closed {
                            narration: Some(narration),
                            payload,
                        }
                    }
                    None => Detection::Opened { narration },
                }
            }
            Phase::Open => {
                self.buffer.push_str(fragment);
                match self.closed_payload() {
                    Some(payload) => {
                        self.phase = Phase::Closed;
                        Detection::Closed {
                            narration: None,
                            payload,
                        }
                    }
                    None => Detection::Pending,
                }
            }
            Phase::Closed => Detection::Pending,
        }
    }

    /// Text strictly between the delimiters, trimmed, if the directive is closed
    fn closed_payload(&self) -> Option<String> {
        let body = self.buffer.strip_prefix(START_DELIMITER)?;
        let (payload, _) = body.split_once(END_DELIMITER)?;
        Some(payload.trim().to_string())
    }
}
