//! Cross-cutting services module
//!
//! Observer hooks shared by the clearance loop and its callers.

pub mod events;

pub use events::{
    ClearanceEvent, ClearedEvent, EventDispatcher, EventHandler, LoggingHandler,
    NavigationEvent, ProbeEvent, TimedOutEvent, WaitingEvent,
};
