use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::rich_text::{RichTextDocument, RichTextNode};

/// Distinct mentioned user ids of a document, in first-seen order.
/// Malformed documents yield an empty list.
pub fn extract_mentions(doc: &Value) -> Vec<Uuid> {
    let mut found = Vec::new();
    for_each_new_mention(doc, &mut HashSet::new(), |user| found.push(user));
    found
}

/// Walk `doc` and call `on_new` once for every mentioned user not already in
/// `seen`, as soon as it is encountered. `seen` is updated in place.
pub fn for_each_new_mention<F>(doc: &Value, seen: &mut HashSet<Uuid>, mut on_new: F)
where
    F: FnMut(Uuid),
{
    let Some(document) = RichTextDocument::parse(doc) else {
        debug!("Rich text document has no content array, skipping mentions");
        return;
    };

    document.walk(|node| {
        let RichTextNode::UserMention { id: Some(id) } = node else {
            return;
        };

        match id.parse::<Uuid>() {
            Ok(user) => {
                if seen.insert(user) {
                    on_new(user);
                }
            }
            Err(_) => debug!("Ignoring mention with non-uuid id '{}'", id),
        }
    });
}
