//! Shared types for the integration relay: wire contract, dispatch results,
//! error taxonomy and the course prompt builder.

pub mod error;
pub mod prompt;
pub mod types;

pub use error::RelayError;
pub use prompt::{Course, MAX_COURSES, MIN_COURSES, build_prompt, can_generate};
pub use types::{
    ALL_LIMITED_MESSAGE, DispatchResult, ErrorBody, GenerateRequest, GenerateResponse,
    RateLimitedBody,
};
