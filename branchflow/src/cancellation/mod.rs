//! Cooperative cancellation.
//!
//! `CancellationToken` is shared between a task handle, the worker running
//! the task, and anyone who may ask the task to stop.

mod token;

pub use token::CancellationToken;
