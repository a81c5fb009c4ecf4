//! Conversational core: state machine, typed session context, flow
//! handlers, and the dispatcher that drives them per inbound event.

pub mod context;
pub mod dedup;
pub mod dispatcher;
pub mod flows;
pub mod locks;
pub mod state_machine;

pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher, PruneReport};
pub use flows::{Collaborators, FlowOutcome, FlowSettings};
