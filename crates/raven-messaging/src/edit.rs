use raven_types::models::Message;

/// Mark `message` edited when its text differs from the stored `previous`.
/// Never clears the flag.
pub fn track_edit(previous: &Message, message: &mut Message) {
    if previous.text != message.text {
        message.edit_state.mark_edited();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::models::EditState;
    use uuid::Uuid;

    fn message_with(text: &str) -> Message {
        let mut m = Message::new(Uuid::new_v4(), Uuid::new_v4());
        m.text = Some(text.to_string());
        m
    }

    #[test]
    fn changed_text_marks_edited() {
        let previous = message_with("hi");
        let mut current = previous.clone();
        current.text = Some("hello".into());

        track_edit(&previous, &mut current);
        assert!(current.is_edited());
    }

    #[test]
    fn reaction_only_change_is_not_an_edit() {
        let previous = message_with("hi");
        let mut current = previous.clone();
        current.message_reactions = Some(serde_json::json!({ "👍": { "count": 1 } }));

        track_edit(&previous, &mut current);
        assert_eq!(current.edit_state, EditState::Original);
    }

    #[test]
    fn reverting_text_keeps_edited() {
        let mut previous = message_with("hello");
        previous.edit_state = EditState::Edited;
        let mut current = previous.clone();
        current.text = Some("hello".into());

        track_edit(&previous, &mut current);
        assert!(current.is_edited());
    }
}
