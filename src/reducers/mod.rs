mod accumulate_usage;
mod add_errors;
mod add_messages;
mod overwrite_next;
mod reducer_registry;

pub use accumulate_usage::AccumulateUsage;
pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use overwrite_next::OverwriteNext;
pub use reducer_registry::*;

use crate::node::NodePartial;
use crate::state::TurnState;
use crate::types::ChannelType;
use miette::Diagnostic;
use thiserror::Error;

/// Unified reducer trait: every reducer folds a NodePartial delta into
/// TurnState for the channel it owns.
///
/// Channels implemented: messages (append with replace-by-id), next
/// (overwrite), usage (accumulate), and errors (append).
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut TurnState, update: &NodePartial);
}

#[derive(Debug, Error, Diagnostic)]
pub enum ReducerError {
    #[error("no reducers registered for channel: {0:?}")]
    #[diagnostic(
        code(colloquy::reducer::unknown_channel),
        help("register a reducer for this channel or use ReducerRegistry::default()")
    )]
    UnknownChannel(ChannelType),
}
