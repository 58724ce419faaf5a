//! Tag tokenizing over the text runs of one paragraph.
//!
//! A paragraph's text is split across `<w:t>` nodes by the word processor,
//! often in the middle of a tag. The scanner walks the nodes as one
//! character stream and records each tag in the node where it starts; the
//! rest of the tag is dropped from later nodes.

use std::fmt;

const OPEN: char = '{';
const CLOSE: char = '}';

/// What a tag does when rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    /// `{name}`
    Value,
    /// `{#name}`: shown for truthy values, repeated for arrays
    Section,
    /// `{^name}`: shown for falsy values and empty arrays
    Inverted,
    /// `{/name}`, or `{/}` to close whatever is open
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    pub kind: TagKind,
    pub name: String,
}

impl Tag {
    /// `None` for a tag without a name; only `{/}` may omit it
    fn parse(raw: &str) -> Option<Tag> {
        let raw = raw.trim();
        let (kind, name) = match raw.chars().next() {
            Some('#') => (TagKind::Section, &raw[1..]),
            Some('^') => (TagKind::Inverted, &raw[1..]),
            Some('/') => (TagKind::Close, &raw[1..]),
            _ => (TagKind::Value, raw),
        };
        let name = name.trim();
        if raw.is_empty() || (name.is_empty() && kind != TagKind::Close) {
            return None;
        }
        Some(Tag {
            kind,
            name: name.to_string(),
        })
    }

    pub fn opens_section(&self) -> bool {
        matches!(self.kind, TagKind::Section | TagKind::Inverted)
    }
}

/// A malformed tag or section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagError {
    pub id: &'static str,
    pub message: &'static str,
    pub explanation: String,
}

impl TagError {
    pub(crate) fn unclosed(name: &str) -> Self {
        Self {
            id: "unclosed_tag",
            message: "Unclosed tag",
            explanation: format!("The tag beginning with \"{OPEN}{}\" is unclosed", preview(name)),
        }
    }

    pub(crate) fn unopened(before: &str) -> Self {
        Self {
            id: "unopened_tag",
            message: "Unopened tag",
            explanation: format!("The tag \"{}{CLOSE}\" is unopened", preview_tail(before)),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            id: "empty_tag",
            message: "Empty tag",
            explanation: format!("A tag \"{OPEN}{CLOSE}\" has no name"),
        }
    }

    pub(crate) fn unclosed_loop(name: &str) -> Self {
        Self {
            id: "unclosed_loop",
            message: "Unclosed loop",
            explanation: format!("The loop with tag \"{name}\" is unclosed"),
        }
    }

    pub(crate) fn unopened_loop(name: &str) -> Self {
        Self {
            id: "unopened_loop",
            message: "Unopened loop",
            explanation: format!("The loop with tag \"{name}\" is unopened"),
        }
    }

    pub(crate) fn mismatched(open: &str, close: &str) -> Self {
        Self {
            id: "closing_tag_does_not_match_opening_tag",
            message: "Closing tag does not match opening tag",
            explanation: format!("The tag \"{open}\" is closed by the tag \"{close}\""),
        }
    }

    pub(crate) fn unbalanced_loop(name: &str) -> Self {
        Self {
            id: "unbalanced_loop_tags",
            message: "Unbalanced loop tag",
            explanation: format!("Unbalanced loop tags {OPEN}#{name}{CLOSE}{OPEN}/{name}{CLOSE}"),
        }
    }
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.explanation, self.id, self.message)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(10).collect()
}

fn preview_tail(text: &str) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(10)).collect()
}

/// Content of one `<w:t>` node after scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Text(String),
    /// Index into [`ParagraphScan::tags`]
    Tag(usize),
}

/// Result of scanning one paragraph
#[derive(Debug, Default)]
pub(crate) struct ParagraphScan {
    /// One entry per input node
    pub nodes: Vec<Vec<Piece>>,
    pub tags: Vec<Tag>,
    pub errors: Vec<TagError>,
}

impl ParagraphScan {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// True when the paragraph holds a single tag and otherwise only whitespace
    pub fn is_standalone_tag(&self) -> bool {
        self.tags.len() == 1
            && self.nodes.iter().flatten().all(|piece| match piece {
                Piece::Text(text) => text.trim().is_empty(),
                Piece::Tag(_) => true,
            })
    }
}

/// Split `texts` (the unescaped content of consecutive `<w:t>` nodes) into
/// plain text and tags.
pub(crate) fn scan_paragraph(texts: &[String]) -> ParagraphScan {
    let mut scan = ParagraphScan {
        nodes: vec![Vec::new(); texts.len()],
        ..Default::default()
    };
    // (node where the open brace sits, tag text so far)
    let mut open: Option<(usize, String)> = None;
    let mut outside = String::new();

    for (index, text) in texts.iter().enumerate() {
        let mut pending = String::new();

        for c in text.chars() {
            match open.as_mut() {
                None if c == OPEN => {
                    push_text(&mut scan.nodes[index], &pending);
                    pending.clear();
                    open = Some((index, String::new()));
                    outside.clear();
                }
                None => {
                    if c == CLOSE {
                        scan.errors.push(TagError::unopened(&outside));
                    }
                    pending.push(c);
                    outside.push(c);
                }
                Some((_, raw)) if c == OPEN => {
                    scan.errors.push(TagError::unclosed(raw));
                    push_text(&mut scan.nodes[index], &pending);
                    pending.clear();
                    open = Some((index, String::new()));
                }
                Some((start, raw)) if c == CLOSE => {
                    match Tag::parse(raw) {
                        Some(tag) => {
                            scan.nodes[*start].push(Piece::Tag(scan.tags.len()));
                            scan.tags.push(tag);
                        }
                        None => scan.errors.push(TagError::empty()),
                    }
                    open = None;
                }
                Some((_, raw)) => raw.push(c),
            }
        }

        push_text(&mut scan.nodes[index], &pending);
    }

    if let Some((_, raw)) = open {
        scan.errors.push(TagError::unclosed(&raw));
    }

    scan
}

fn push_text(pieces: &mut Vec<Piece>, text: &str) {
    if text.is_empty() {
        return;
    }
    match pieces.last_mut() {
        Some(Piece::Text(last)) => last.push_str(text),
        _ => pieces.push(Piece::Text(text.to_string())),
    }
}
