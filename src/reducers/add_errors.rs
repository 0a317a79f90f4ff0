use super::Reducer;
use crate::{node::NodePartial, state::TurnState};

/// Append-only error channel. Events are never deduplicated; the full
/// sequence is part of the turn record.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddErrors;

impl Reducer for AddErrors {
    fn apply(&self, state: &mut TurnState, update: &NodePartial) {
        if let Some(errors_update) = &update.errors
            && !errors_update.is_empty()
        {
            state.errors.extend(errors_update.iter().cloned());
        }
    }
}
