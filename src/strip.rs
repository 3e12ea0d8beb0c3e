//! Removal of inline `<think>` regions from completed replies.

/// Opening marker of an inline reasoning region.  Attributes may follow
/// before the closing `>`.
pub const OPEN_MARKER: &str = "<think";

/// Closing marker of an inline reasoning region.
pub const CLOSE_MARKER: &str = "</think";

/// Removes every `<think …>…</think>` region from `text`.
///
/// Regions do not nest.  An opening marker that is never closed, or whose
/// `>` never arrives, drops everything from the marker to the end.  The
/// pass repeats until nothing changes, so the result never contains a
/// region that a single pass would remove.
pub fn strip_think_tags(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut remaining = text;
    while !remaining.is_empty() {
        let Some(start) = remaining.find(OPEN_MARKER) else {
            result.push_str(remaining);
            break;
        };
        result.push_str(&remaining[..start]);
        let inside = skip_past_gt(&remaining[start + OPEN_MARKER.len()..]);
        let Some(close) = inside.find(CLOSE_MARKER) else {
            break;
        };
        remaining = skip_past_gt(&inside[close + CLOSE_MARKER.len()..]);
    }
    result
}

/// Returns the text after the next `>`, or nothing when there is none.
fn skip_past_gt(text: &str) -> &str {
    match text.find('>') {
        Some(idx) => &text[idx + 1..],
        None => "",
    }
}
