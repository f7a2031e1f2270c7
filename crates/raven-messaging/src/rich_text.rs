//! Typed view over the editor's JSON document.
//!
//! The editor stores messages as nested `{type, attrs, content}` objects.
//! Anything that does not have that shape is dropped while building the
//! tree, so callers never see a parse error.

use serde_json::Value;

pub const USER_MENTION: &str = "userMention";

#[derive(Debug, Clone, PartialEq)]
pub enum RichTextNode {
    /// `{"type": "userMention", "attrs": {"id": ...}}`
    UserMention { id: Option<String> },
    /// `{"type": "text", "text": ...}`
    Text(String),
    /// Any other node, typed or not, with its children.
    Element {
        kind: Option<String>,
        children: Vec<RichTextNode>,
    },
}

impl RichTextNode {
    /// Build a node from JSON. Returns `None` for anything that is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = obj.get("type").and_then(Value::as_str);

        let node = match kind {
            Some(USER_MENTION) => Self::UserMention {
                id: obj
                    .get("attrs")
                    .and_then(|attrs| attrs.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            Some("text") => Self::Text(
                obj.get("text")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_owned(),
            ),
            _ => Self::Element {
                kind: kind.map(str::to_owned),
                children: children_of(obj.get("content")),
            },
        };

        Some(node)
    }

    /// Depth-first, document-order walk.
    pub fn walk<F: FnMut(&RichTextNode)>(&self, visit: &mut F) {
        visit(self);
        if let Self::Element { children, .. } = self {
            for child in children {
                child.walk(visit);
            }
        }
    }
}

/// Root of an editor document: an object with a `content` array.
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextDocument {
    pub nodes: Vec<RichTextNode>,
}

impl RichTextDocument {
    /// Returns `None` when the root is not an object with a `content` array.
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_object()?.get("content")? {
            content @ Value::Array(_) => Some(Self {
                nodes: children_of(Some(content)),
            }),
            _ => None,
        }
    }

    pub fn walk<F: FnMut(&RichTextNode)>(&self, mut visit: F) {
        for node in &self.nodes {
            node.walk(&mut visit);
        }
    }
}

fn children_of(content: Option<&Value>) -> Vec<RichTextNode> {
    match content {
        Some(Value::Array(items)) => items.iter().filter_map(RichTextNode::from_value).collect(),
        _ => Vec::new(),
    }
}
