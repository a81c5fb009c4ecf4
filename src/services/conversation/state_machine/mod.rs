//! Conversation state machine.
//!
//! # Architecture
//!
//! - **States** ([State]): the catalog, grouped into [FlowType] families
//! - **Transitions** ([TransitionTable]): allowed next states per state
//! - **Schema** ([ContextSchema]): context fields required to enter a state
//! - **Machine** ([StateMachine]): validates, merges context, commits, logs
//!
//! # Flow shape
//!
//! ```text
//!                ┌──────────┐
//!   any state ──>│   HOME   │──> MOBILITY ──> nearby | schedule | vehicle
//!   (home cmd)   └──────────┘──> QR_MENU ──> ... ──> QR_GENERATED
//!                     ▲     └──> INSURANCE_MENU ──> ... ──> INSURANCE_QUOTE_READY
//!                     │
//!                     └──────── every terminal state
//! ```
//!
//! # Example
//!
//! ```rust
//! use chatflows::models::trips::VehicleType;
//! use chatflows::services::conversation::context::{ContextPatch, FieldValue};
//! use chatflows::services::conversation::state_machine::{State, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(State::NearbySelectVehicle, ContextPatch::new())?;
//! machine.transition_to(
//!     State::NearbyWaitLocation,
//!     FieldValue::VehicleType(VehicleType::Moto).into(),
//! )?;
//!
//! assert_eq!(machine.current_state(), State::NearbyWaitLocation);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod machine;
mod schema;
mod state;
mod transition;

pub use machine::{StateMachine, StateTransition, TransitionLog};
pub use schema::ContextSchema;
pub use state::{FlowType, HOME, State};
pub use transition::{TransitionError, TransitionTable};
