//! Incremental separation of inline `<think>` regions from streamed text.
//!
//! [`ThinkSplitter`] is fed text deltas as they arrive.  Markers may be cut
//! anywhere by the network, so the splitter holds back any trailing text
//! that could still grow into a marker and completes it with the next
//! delta.

use crate::strip::{CLOSE_MARKER, OPEN_MARKER};

/// A classified slice of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Answer text, always shown.
    Visible(String),
    /// Text inside a reasoning region.
    Reasoning(String),
    /// An opening marker was consumed.
    ReasoningStart,
    /// A closing marker was consumed.
    ReasoningEnd,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    #[default]
    Outside,
    /// Discarding the opening marker's attributes up to `>`.
    OpeningTag,
    Inside,
    /// Discarding the closing marker's tail up to `>`.
    ClosingTag,
}

/// Splits a stream of text deltas into visible and reasoning segments.
#[derive(Debug, Default, Clone)]
pub struct ThinkSplitter {
    state: SplitState,
    pending: String,
}

impl ThinkSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while between an opening and a closing marker.
    pub fn inside_tag(&self) -> bool {
        self.state != SplitState::Outside
    }

    /// Consumes one text delta and returns the segments it completes.
    pub fn push(&mut self, delta: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.push_str(delta);

        let mut rest = buffer.as_str();
        while !rest.is_empty() {
            match self.state {
                SplitState::Outside => match rest.find(OPEN_MARKER) {
                    Some(idx) => {
                        push_text(&mut segments, Segment::Visible, &rest[..idx]);
                        segments.push(Segment::ReasoningStart);
                        self.state = SplitState::OpeningTag;
                        rest = &rest[idx + OPEN_MARKER.len()..];
                    }
                    None => {
                        let split = rest.len() - partial_marker_len(rest, OPEN_MARKER);
                        push_text(&mut segments, Segment::Visible, &rest[..split]);
                        self.pending.push_str(&rest[split..]);
                        rest = "";
                    }
                },
                SplitState::OpeningTag => match rest.find('>') {
                    Some(idx) => {
                        self.state = SplitState::Inside;
                        rest = &rest[idx + 1..];
                    }
                    None => rest = "",
                },
                SplitState::Inside => match rest.find(CLOSE_MARKER) {
                    Some(idx) => {
                        push_text(&mut segments, Segment::Reasoning, &rest[..idx]);
                        segments.push(Segment::ReasoningEnd);
                        self.state = SplitState::ClosingTag;
                        rest = &rest[idx + CLOSE_MARKER.len()..];
                    }
                    None => {
                        let split = rest.len() - partial_marker_len(rest, CLOSE_MARKER);
                        push_text(&mut segments, Segment::Reasoning, &rest[..split]);
                        self.pending.push_str(&rest[split..]);
                        rest = "";
                    }
                },
                SplitState::ClosingTag => match rest.find('>') {
                    Some(idx) => {
                        self.state = SplitState::Outside;
                        rest = &rest[idx + 1..];
                    }
                    None => rest = "",
                },
            }
        }
        segments
    }

    /// Releases text held back as a possible marker prefix.  Called once
    /// the stream has ended.
    pub fn finish(&mut self) -> Vec<Segment> {
        let pending = std::mem::take(&mut self.pending);
        let mut segments = Vec::new();
        match self.state {
            SplitState::Outside => push_text(&mut segments, Segment::Visible, &pending),
            SplitState::Inside => push_text(&mut segments, Segment::Reasoning, &pending),
            SplitState::OpeningTag | SplitState::ClosingTag => {}
        }
        segments
    }
}

fn push_text(segments: &mut Vec<Segment>, make: fn(String) -> Segment, text: &str) {
    if !text.is_empty() {
        segments.push(make(text.to_string()));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}
