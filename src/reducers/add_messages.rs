use super::Reducer;
use crate::{node::NodePartial, state::TurnState};

/// Appends incoming messages, replacing an existing message in place when
/// the ids match. Messages without an id always append.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut TurnState, update: &NodePartial) {
        if let Some(messages_update) = &update.messages
            && !messages_update.is_empty()
        {
            for incoming in messages_update {
                let replaced = incoming.id.as_ref().and_then(|id| {
                    state
                        .messages
                        .iter_mut()
                        .find(|m| m.id.as_deref() == Some(id.as_str()))
                });
                match replaced {
                    Some(existing) => *existing = incoming.clone(),
                    None => state.messages.push(incoming.clone()),
                }
            }
        }
    }
}
