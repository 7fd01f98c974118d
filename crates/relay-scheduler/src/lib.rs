//! Client-side retry scheduler: issues generation requests, and while every
//! credential is rate-limited runs a visible countdown before re-dispatching.

pub mod scheduler;
pub mod state;
pub mod transport;

pub use scheduler::{RetryScheduler, SchedulerEvent};
pub use state::{Phase, RetryState};
pub use transport::{DispatchTransport, HttpDispatchClient, NO_TEXT_MESSAGE, interpret_response};
