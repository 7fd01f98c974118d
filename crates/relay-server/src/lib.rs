//! HTTP dispatch endpoint: exposes a [`relay_dispatch::Dispatcher`] over the
//! JSON wire contract shared with `relay-scheduler`.

pub mod routes;
pub mod serve;

pub use routes::{HEALTH_ROUTE, MALFORMED_PROMPT_MESSAGE, METHOD_NOT_ALLOWED_MESSAGE, router};
pub use serve::{HttpEndpoint, serve_until};
