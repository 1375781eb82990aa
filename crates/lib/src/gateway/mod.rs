//! Gateway: HTTP boundary tying the session codec, command registry, argument
//! validator, and process supervisor together behind authentication and rate
//! limiting. Also serves the bundled browser UI.

mod protocol;
mod ratelimit;
mod server;

pub use protocol::{CommandsResponse, RunRequest, RunResponse};
pub use ratelimit::RateLimiter;
pub use server::run_gateway;
