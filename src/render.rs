use crate::transcript::{parse_blocks, Block, SpeakerNames};
use regex::Regex;
use std::sync::LazyLock;

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r\n|[\n\r\x0b\x0c\x1c-\x1e\x{85}\x{2028}\x{2029}]")
        .expect("line break pattern is valid")
});

/// Blank line between rendered speaker lines.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Everything the cleaning pipeline needs besides the text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    pub names: SpeakerNames,
    pub separator: String,
}

impl Default for CleanOptions {
    fn default() -> Self {
        CleanOptions {
            names: SpeakerNames::default(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Merge adjacent blocks that carry the same label.
///
/// This runs independently of the scanner's own merging, so blocks built by
/// hand or from other sources are merged too.
pub fn merge_blocks(blocks: &[Block]) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::with_capacity(blocks.len());

    for block in blocks {
        match merged.last_mut() {
            Some(last) if last.speaker == block.speaker => {
                last.text.push(' ');
                last.text.push_str(&block.text);
            }
            _ => merged.push(block.clone()),
        }
    }

    merged
}

/// Render blocks as `"<speaker>: <text>"` lines joined by `separator`.
///
/// The result is trimmed and always ends with exactly one `\n`.
pub fn render_blocks(blocks: &[Block], separator: &str) -> String {
    let lines: Vec<String> = merge_blocks(blocks)
        .iter()
        .map(|block| format!("{}: {}", block.speaker, block.text))
        .collect();

    let mut rendered = lines.join(separator).trim().to_string();
    rendered.push('\n');
    rendered
}

/// Split text on every line boundary: `\r\n`, lone `\r` and `\n`, and the
/// vertical tab, form feed, separator and Unicode line/paragraph breaks. A
/// final terminator does not produce an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = LINE_BREAK_RE.split(text).collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Clean a whole transcript: drop timecodes, name speakers, merge turns.
pub fn clean_transcript(text: &str, options: &CleanOptions) -> String {
    let lines = split_lines(text);
    let blocks = parse_blocks(&lines, &options.names);
    render_blocks(&blocks, &options.separator)
}
