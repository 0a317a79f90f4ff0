use super::Reducer;
use crate::{node::NodePartial, state::TurnState};

/// Adds incoming token counts into the running turn total. Addition
/// saturates so a misbehaving provider cannot wrap the counters.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AccumulateUsage;

impl Reducer for AccumulateUsage {
    fn apply(&self, state: &mut TurnState, update: &NodePartial) {
        if let Some(usage) = &update.usage {
            state.usage.add(usage);
        }
    }
}
