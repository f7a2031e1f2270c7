use serde_json::{Map, Value, json};
use uuid::Uuid;

use raven_types::api::ReactionGroup;

/// Build the `message_reactions` aggregate from reaction rows:
/// `{emoji: {reaction, count, users}}`, users in reaction order.
/// Returns `None` when there are no reactions.
pub fn aggregate(rows: &[(Uuid, String)]) -> Option<Value> {
    if rows.is_empty() {
        return None;
    }

    let mut groups: Vec<ReactionGroup> = Vec::new();
    for (user, emoji) in rows {
        match groups.iter_mut().find(|g| &g.reaction == emoji) {
            Some(group) => {
                group.users.push(*user);
                group.count += 1;
            }
            None => groups.push(ReactionGroup {
                reaction: emoji.clone(),
                count: 1,
                users: vec![*user],
            }),
        }
    }

    let mut map = Map::new();
    for group in groups {
        let entry = json!({
            "reaction": group.reaction,
            "count": group.count,
            "users": group.users,
        });
        map.insert(group.reaction, entry);
    }
    Some(Value::Object(map))
}
