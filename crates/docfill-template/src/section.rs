//! Section pairing and the data scopes sections open.

use serde_json::{Map, Value};

use crate::scan::{Tag, TagError, TagKind};
use crate::value_text;

/// Matched sections as (open, close) positions in the tag sequence
#[derive(Debug, Default)]
pub(crate) struct Pairing {
    pub pairs: Vec<(usize, usize)>,
    pub errors: Vec<TagError>,
}

/// Match section openers with closers over `tags` in document order.
///
/// A closer without a name closes the innermost open section.
pub(crate) fn pair_sections(tags: &[&Tag]) -> Pairing {
    let mut pairing = Pairing::default();
    let mut open: Vec<usize> = Vec::new();

    for (index, tag) in tags.iter().enumerate() {
        if tag.opens_section() {
            open.push(index);
            continue;
        }
        if tag.kind != TagKind::Close {
            continue;
        }
        match open.pop() {
            None => pairing.errors.push(TagError::unopened_loop(&tag.name)),
            Some(opener) => {
                let name = &tags[opener].name;
                if tag.name.is_empty() || *name == tag.name {
                    pairing.pairs.push((opener, index));
                } else {
                    pairing.errors.push(TagError::mismatched(name, &tag.name));
                }
            }
        }
    }

    for opener in open {
        pairing.errors.push(TagError::unclosed_loop(&tags[opener].name));
    }

    pairing
}

/// Falsy values hide `{#}` sections and show `{^}` ones
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Names visible while rendering: the replacement map plus one value per
/// enclosing section
pub(crate) struct Scope<'a> {
    root: &'a Map<String, Value>,
    stack: Vec<&'a Value>,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Map<String, Value>) -> Self {
        Self {
            root,
            stack: Vec::new(),
        }
    }

    pub fn push(&mut self, value: &'a Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// `.` is the current section value; other names are looked up in the
    /// innermost object that has them, then in the replacement map
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        if name == "." {
            return self.stack.last().copied();
        }
        self.stack
            .iter()
            .rev()
            .find_map(|value| value.as_object().and_then(|m| m.get(name)))
            .or_else(|| self.root.get(name))
    }

    /// Text for a value tag; missing names render empty
    pub fn text(&self, name: &str) -> String {
        self.lookup(name).map(value_text).unwrap_or_default()
    }

    /// One entry per pass over a section's content; `Some` is pushed as the
    /// scope of that pass
    pub fn iterations(&self, tag: &Tag) -> Vec<Option<&'a Value>> {
        let value = self.lookup(&tag.name);
        match tag.kind {
            TagKind::Section => match value {
                Some(Value::Array(items)) => items.iter().map(Some).collect(),
                Some(v) if is_truthy(v) => vec![Some(v)],
                _ => Vec::new(),
            },
            TagKind::Inverted if value.map_or(false, is_truthy) => Vec::new(),
            TagKind::Inverted => vec![None],
            TagKind::Value | TagKind::Close => Vec::new(),
        }
    }
}
