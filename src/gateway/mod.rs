//! HTTP front-end: request gate, routes and server loop

pub mod handlers;
pub mod middleware;
pub mod outcome;
mod router;
mod server;

pub use middleware::request_gate;
pub use outcome::Outcome;
pub use router::{AppState, create_router};
pub use server::{Gateway, spawn_sweeper};
