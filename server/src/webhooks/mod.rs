//! Automation Engine Callbacks
//!
//! Signed notifications from the engine reporting how an ingestion attempt
//! ended.

pub mod events;
pub mod handlers;
pub mod processor;
pub mod signing;

pub use events::{CallbackEventType, CallbackPayload};
pub use processor::{CallbackOutcome, CallbackPolicy, CallbackProcessor};
