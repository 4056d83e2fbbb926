//! Line classification and the block scanner for timecoded speaker transcripts.
//!
//! Input looks like:
//!
//! ```text
//! [09:43:41:02 - 09:43:41:13]
//! Speaker 1
//! Hello there.
//!
//! [09:43:42:00 - 09:43:44:10]
//! Speaker 2
//! Hi!
//! ```

use crate::collapse_whitespace;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Label used for text that appears before any speaker marker.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

static TIMECODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[\d{2}:\d{2}:\d{2}:\d{2}\s*-\s*\d{2}:\d{2}:\d{2}:\d{2}\]\s*$")
        .expect("timecode pattern is valid")
});

static SPEAKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(speaker)\s+(\d+)\s*$").expect("speaker pattern is valid")
});

/// Display names substituted for speaker indices "1" and "2".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerNames {
    pub first: String,
    pub second: String,
}

impl Default for SpeakerNames {
    fn default() -> Self {
        SpeakerNames {
            first: "Speaker 1".to_string(),
            second: "Speaker 2".to_string(),
        }
    }
}

impl SpeakerNames {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        SpeakerNames {
            first: first.into(),
            second: second.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Timecode,
    /// `index` is the digit string exactly as written, `raw` the whole line.
    Speaker {
        index: &'a str,
        raw: &'a str,
    },
    /// Trimmed, never empty.
    Text(&'a str),
    Blank,
}

pub fn classify(line: &str) -> LineKind<'_> {
    if TIMECODE_RE.is_match(line) {
        return LineKind::Timecode;
    }

    if let Some(captures) = SPEAKER_RE.captures(line) {
        if let Some(index) = captures.get(2) {
            return LineKind::Speaker {
                index: index.as_str(),
                raw: line,
            };
        }
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else {
        LineKind::Text(trimmed)
    }
}

/// Map a speaker index to its display name. Only the exact strings "1" and
/// "2" are substituted, so "01" stays "Speaker 01".
pub fn resolve_speaker_name(index: &str, names: &SpeakerNames) -> String {
    match index {
        "1" => names.first.clone(),
        "2" => names.second.clone(),
        other => format!("Speaker {}", other),
    }
}

/// Label for an arbitrary marker line; anything that isn't a speaker marker is
/// only trimmed.
pub fn speaker_label(raw: &str, names: &SpeakerNames) -> String {
    match classify(raw) {
        LineKind::Speaker { index, .. } => resolve_speaker_name(index, names),
        _ => raw.trim().to_string(),
    }
}

/// A contiguous run of text attributed to one speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub speaker: String,
    pub text: String,
}

impl Block {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Block {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug)]
struct OpenBlock {
    speaker: String,
    fragments: Vec<String>,
}

/// Owns the currently open block and the blocks closed so far.
#[derive(Debug, Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    current: Option<OpenBlock>,
}

impl BlockBuilder {
    /// Open a block for `speaker` unless the open one already belongs to it.
    fn switch_speaker(&mut self, speaker: String) {
        if let Some(open) = &self.current {
            if open.speaker == speaker {
                return;
            }
            self.close();
        }

        debug!(speaker = %speaker, "opening block");
        self.current = Some(OpenBlock {
            speaker,
            fragments: Vec::new(),
        });
    }

    fn push_text(&mut self, text: &str) {
        let open = self.current.get_or_insert_with(|| {
            debug!("text before any speaker marker, opening {} block", UNKNOWN_SPEAKER);
            OpenBlock {
                speaker: UNKNOWN_SPEAKER.to_string(),
                fragments: Vec::new(),
            }
        });
        open.fragments.push(text.to_string());
    }

    fn close(&mut self) {
        if let Some(open) = self.current.take() {
            let text = collapse_whitespace(&open.fragments.join(" "));
            debug!(
                speaker = %open.speaker,
                fragments = open.fragments.len(),
                "closing block"
            );
            self.blocks.push(Block {
                speaker: open.speaker,
                text,
            });
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.close();
        self.blocks
    }
}

/// Cursor over the full line list. Timecodes drive a lookahead for the next
/// speaker marker; everything else is handled one line at a time.
struct Scanner<'a, S> {
    lines: &'a [S],
    pos: usize,
    names: &'a SpeakerNames,
    builder: BlockBuilder,
}

impl<'a, S: AsRef<str>> Scanner<'a, S> {
    fn new(lines: &'a [S], names: &'a SpeakerNames) -> Self {
        Scanner {
            lines,
            pos: 0,
            names,
            builder: BlockBuilder::default(),
        }
    }

    fn line(&self, pos: usize) -> &'a str {
        let lines: &'a [S] = self.lines;
        lines[pos].as_ref()
    }

    fn run(mut self) -> Vec<Block> {
        while self.pos < self.lines.len() {
            match classify(self.line(self.pos)) {
                LineKind::Timecode => {
                    if !self.after_timecode() {
                        break;
                    }
                }
                LineKind::Speaker { index, .. } => {
                    self.builder
                        .switch_speaker(resolve_speaker_name(index, self.names));
                    self.pos += 1;
                }
                LineKind::Text(text) => {
                    self.builder.push_text(text);
                    self.pos += 1;
                }
                LineKind::Blank => self.pos += 1,
            }
        }

        self.builder.finish()
    }

    /// Handle the segment following a timecode line. Returns false when the
    /// input ends before any non-blank line.
    fn after_timecode(&mut self) -> bool {
        self.pos += 1;
        while self.pos < self.lines.len() && self.line(self.pos).trim().is_empty() {
            self.pos += 1;
        }
        if self.pos >= self.lines.len() {
            return false;
        }

        let next = self.line(self.pos);
        self.pos += 1;
        match classify(next) {
            LineKind::Speaker { index, .. } => {
                self.builder
                    .switch_speaker(resolve_speaker_name(index, self.names));
                self.collect_turn();
            }
            // A second timecode here is malformed too and kept as text.
            _ => self.builder.push_text(next.trim()),
        }
        true
    }

    /// Everything up to the next timecode belongs to the open block, speaker
    /// markers included.
    fn collect_turn(&mut self) {
        while self.pos < self.lines.len() {
            let line = self.line(self.pos);
            if TIMECODE_RE.is_match(line) {
                break;
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                self.builder.push_text(trimmed);
            }
            self.pos += 1;
        }
    }
}

/// Scan transcript lines into speaker blocks in discovery order.
///
/// Consecutive turns by the same speaker stay in one block. Text with no
/// preceding speaker marker lands in an `"Unknown"` block; nothing is dropped
/// except timecodes, blank lines and the markers themselves.
pub fn parse_blocks<S: AsRef<str>>(lines: &[S], names: &SpeakerNames) -> Vec<Block> {
    let blocks = Scanner::new(lines, names).run();
    debug!(
        lines = lines.len(),
        blocks = blocks.len(),
        "transcript scan finished"
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const TC1: &str = "[09:43:41:02 - 09:43:41:13]";
    const TC2: &str = "[09:43:42:00 - 09:43:44:10]";

    fn parse(lines: &[&str]) -> Vec<Block> {
        parse_blocks(lines, &SpeakerNames::default())
    }

    #[test]
    fn test_classify_timecode() {
        assert_eq!(classify(TC1), LineKind::Timecode);
        assert_eq!(classify("  [00:00:00:00-01:02:03:04]  "), LineKind::Timecode);
        assert_eq!(
            classify("[0:00:00:00 - 00:00:00:00]"),
            LineKind::Text("[0:00:00:00 - 00:00:00:00]")
        );
        assert_eq!(
            classify("[00:00:00:00 - 00:00:00:00] hi"),
            LineKind::Text("[00:00:00:00 - 00:00:00:00] hi")
        );
    }

    #[test]
    fn test_classify_speaker() {
        assert_eq!(
            classify("Speaker 1"),
            LineKind::Speaker {
                index: "1",
                raw: "Speaker 1"
            }
        );
        assert_eq!(
            classify("  sPeAkEr   12 "),
            LineKind::Speaker {
                index: "12",
                raw: "  sPeAkEr   12 "
            }
        );
        assert_eq!(classify("Speaker1"), LineKind::Text("Speaker1"));
        assert_eq!(classify("Speaker 1 says"), LineKind::Text("Speaker 1 says"));
        assert_eq!(classify("Speaker"), LineKind::Text("Speaker"));
    }

    #[test]
    fn test_classify_text_and_blank() {
        assert_eq!(classify("  hello  "), LineKind::Text("hello"));
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(classify(" \t "), LineKind::Blank);
    }

    #[test]
    fn test_resolve_speaker_name() {
        let names = SpeakerNames::new("John", "Mary");
        assert_eq!(resolve_speaker_name("1", &names), "John");
        assert_eq!(resolve_speaker_name("2", &names), "Mary");
        assert_eq!(resolve_speaker_name("3", &names), "Speaker 3");
        assert_eq!(resolve_speaker_name("01", &names), "Speaker 01");
    }

    #[test]
    fn test_speaker_label() {
        let names = SpeakerNames::new("John", "Mary");
        assert_eq!(speaker_label(" SPEAKER 2 ", &names), "Mary");
        assert_eq!(speaker_label("speaker 7", &names), "Speaker 7");
        assert_eq!(speaker_label("  Narrator  ", &names), "Narrator");
    }

    #[test]
    fn test_speaker_switch() {
        let blocks = parse(&[TC1, "Speaker 1", "hello", TC2, "Speaker 2", "world"]);
        assert_eq!(
            blocks,
            vec![Block::new("Speaker 1", "hello"), Block::new("Speaker 2", "world")]
        );
    }

    #[test]
    fn test_same_speaker_merges_across_timecodes() {
        let blocks = parse(&[
            TC1,
            "Speaker 1",
            "first part",
            "",
            TC2,
            "",
            "Speaker 1",
            "second   part",
        ]);
        assert_eq!(blocks, vec![Block::new("Speaker 1", "first part second part")]);
    }

    #[test]
    fn test_multiline_turn_is_joined() {
        let blocks = parse(&[TC1, "Speaker 2", "  one ", "", "two", "\tthree"]);
        assert_eq!(blocks, vec![Block::new("Speaker 2", "one two three")]);
    }

    #[test]
    fn test_text_before_any_speaker_is_unknown() {
        let blocks = parse(&["preamble line", TC1, "Speaker 1", "hi"]);
        assert_eq!(
            blocks,
            vec![Block::new(UNKNOWN_SPEAKER, "preamble line"), Block::new("Speaker 1", "hi")]
        );
    }

    #[test]
    fn test_missing_speaker_after_timecode() {
        let blocks = parse(&[TC1, "", "orphan text", "more text"]);
        assert_eq!(blocks, vec![Block::new(UNKNOWN_SPEAKER, "orphan text more text")]);
    }

    #[test]
    fn test_missing_speaker_appends_to_open_block() {
        let blocks = parse(&[TC1, "Speaker 1", "hello", TC2, "no marker here"]);
        assert_eq!(blocks, vec![Block::new("Speaker 1", "hello no marker here")]);
    }

    #[test]
    fn test_consecutive_timecodes_keep_second_as_text() {
        let blocks = parse(&[TC1, TC2, "Speaker 1", "hi"]);
        assert_eq!(
            blocks,
            vec![Block::new(UNKNOWN_SPEAKER, TC2), Block::new("Speaker 1", "hi")]
        );
    }

    #[test]
    fn test_marker_inside_turn_is_text() {
        let blocks = parse(&[TC1, "Speaker 1", "hello", "Speaker 2", "still one"]);
        assert_eq!(
            blocks,
            vec![Block::new("Speaker 1", "hello Speaker 2 still one")]
        );
    }

    #[test]
    fn test_stray_speaker_marker_switches_block() {
        let blocks = parse(&["Speaker 1", "hi", "Speaker 2", "yo", "Speaker 2", "again"]);
        assert_eq!(
            blocks,
            vec![Block::new("Speaker 1", "hi"), Block::new("Speaker 2", "yo again")]
        );
    }

    #[test]
    fn test_trailing_timecode_flushes_open_block() {
        let blocks = parse(&[TC1, "Speaker 1", "kept", TC2, "", "  "]);
        assert_eq!(blocks, vec![Block::new("Speaker 1", "kept")]);
    }

    #[test]
    fn test_speaker_without_text_yields_empty_block() {
        let blocks = parse(&[TC1, "Speaker 1", TC2, "Speaker 2", "answer"]);
        assert_eq!(
            blocks,
            vec![Block::new("Speaker 1", ""), Block::new("Speaker 2", "answer")]
        );
    }

    #[test]
    fn test_other_indices_ignore_custom_names() {
        let names = SpeakerNames::new("John", "Mary");
        let blocks = parse_blocks(&[TC1, "Speaker 5", "hey"], &names);
        assert_eq!(blocks, vec![Block::new("Speaker 5", "hey")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse(&[]).is_empty());
        assert!(parse(&["", "  "]).is_empty());
    }

    #[test]
    fn test_accepts_owned_lines() {
        let lines: Vec<String> = vec![TC1.to_string(), "Speaker 2".into(), "owned".into()];
        let blocks = parse_blocks(&lines, &SpeakerNames::new("A", "B"));
        assert_eq!(blocks, vec![Block::new("B", "owned")]);
    }
}
