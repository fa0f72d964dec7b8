//! Listener output parsing.
//!
//! Lines are classified by a [`MessageTemplate`]: a line containing the
//! template's marker is a sample and its payload is cut out by fixed offsets
//! (the head and tail lengths), everything else is unmatched.

use crate::models::ParsedOutput;
use serde::Deserialize;
use tracing::debug;

/// Framing of the lines a listener prints for each received sample.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageTemplate {
    /// Text before the payload; only its length is used for slicing.
    pub head: String,
    /// Text after the payload; only its length is used for slicing.
    pub tail: String,
    /// Substring identifying a sample line.
    pub marker: String,
    pub stream: Stream,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
/// Which captured stream carries the listener's messages.
pub enum Stream {
    Stdout,
    Stderr,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        // ROS 2 demo listener; INFO traces go to stderr
        Self {
            head: "[INFO] [1664186953.395023916] [listener]: I heard: [Hello World: ".to_string(),
            tail: "]".to_string(),
            marker: "[listener]: I heard: [Hello World:".to_string(),
            stream: Stream::Stderr,
        }
    }
}

impl MessageTemplate {
    /// Payload of a sample line, or `None` when the line is not a sample.
    ///
    /// A marked line too short to hold head and tail yields `None` as well.
    pub fn payload<'l>(&self, line: &'l str) -> Option<&'l str> {
        if !line.contains(&self.marker) {
            return None;
        }
        let end = line.len().checked_sub(self.tail.len())?;
        line.get(self.head.len()..end)
    }

    /// Split `text` into payloads and unmatched lines.
    pub fn parse_lines(&self, text: &str) -> ParsedOutput {
        let mut out = ParsedOutput::default();
        for line in text.lines() {
            match self.payload(line) {
                Some(p) => out.matched.push(p.to_string()),
                None => {
                    if line.contains(&self.marker) {
                        debug!("Sample line shorter than its template: {:?}", line);
                    }
                    out.unmatched.push(line.to_string())
                }
            }
        }
        out
    }

    /// Parse the stream selected by the template; the other one is ignored.
    pub fn parse_output(&self, stdout: &str, stderr: &str) -> ParsedOutput {
        match self.stream {
            Stream::Stdout => self.parse_lines(stdout),
            Stream::Stderr => self.parse_lines(stderr),
        }
    }
}
