use super::Reducer;
use crate::{node::NodePartial, state::TurnState};

/// Last-writer-wins for the routing channel. Only the supervisor writes
/// `next` in the stock graph, so overwrites are rare in practice.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct OverwriteNext;

impl Reducer for OverwriteNext {
    fn apply(&self, state: &mut TurnState, update: &NodePartial) {
        if let Some(next) = &update.next {
            state.next = next.clone();
        }
    }
}
