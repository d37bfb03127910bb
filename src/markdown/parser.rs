//! Markdown block parser for splitting model output into text and code blocks
//!
//! Model responses interleave prose with fenced code regions. This module
//! performs a single left-to-right scan over the raw response and produces an
//! ordered sequence of blocks that the UI (or history rendering) can consume.

use serde::{Deserialize, Serialize};

/// Fence delimiter for code regions
const FENCE: &str = "```";

/// Default language tag when the opening fence carries none
const DEFAULT_LANGUAGE: &str = "text";

/// A segment of a model response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Prose outside of any fence
    Text { content: String },
    /// Fenced code region with its declared language
    Code { language: String, content: String },
}

impl Block {
    /// Create a text block
    pub fn text(content: impl Into<String>) -> Self {
        Block::Text {
            content: content.into(),
        }
    }

    /// Create a code block
    pub fn code(language: impl Into<String>, content: impl Into<String>) -> Self {
        Block::Code {
            language: language.into(),
            content: content.into(),
        }
    }

    /// Check if this is a code block
    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code { .. })
    }

    /// The raw content of the block, without fences
    pub fn content(&self) -> &str {
        match self {
            Block::Text { content } => content,
            Block::Code { content, .. } => content,
        }
    }

    /// Render the block back to markdown, re-wrapping code in its fence
    pub fn render_markdown(&self) -> String {
        match self {
            Block::Text { content } => content.clone(),
            Block::Code { language, content } => {
                format!("{FENCE}{language}\n{content}\n{FENCE}")
            }
        }
    }
}

/// Split a raw response into ordered text/code blocks.
///
/// Fences are matched left-to-right, non-overlapping and non-nested: a fence
/// marker inside a code region closes it, anything else inside is literal
/// content. An opening fence is a `` ``` `` optionally followed by a
/// word-character language tag and then a newline; a candidate that does not
/// match this shape is treated as plain text.
///
/// Each segment is whitespace-trimmed; empty text segments are dropped.
/// Deterministic and pure: the same input always yields the same blocks.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut consumed = 0;
    let mut search = 0;

    while let Some(found) = text[search..].find(FENCE) {
        let open = search + found;
        let tag_start = open + FENCE.len();

        // Optional language tag: word characters up to the end of line
        let tag_end = text[tag_start..]
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .map(|i| tag_start + i)
            .unwrap_or(text.len());

        // The opening fence must be terminated by a newline
        if text.as_bytes().get(tag_end) != Some(&b'\n') {
            search = open + 1;
            continue;
        }

        let body_start = tag_end + 1;
        let Some(close) = text[body_start..].find(FENCE) else {
            // Unclosed fence: the remainder is trailing text
            break;
        };
        let close = body_start + close;

        let before = text[consumed..open].trim();
        if !before.is_empty() {
            blocks.push(Block::text(before));
        }

        let tag = &text[tag_start..tag_end];
        let language = if tag.is_empty() { DEFAULT_LANGUAGE } else { tag };
        blocks.push(Block::code(language, text[body_start..close].trim()));

        consumed = close + FENCE.len();
        search = consumed;
    }

    let trailing = text[consumed..].trim();
    if !trailing.is_empty() {
        blocks.push(Block::text(trailing));
    }

    blocks
}
