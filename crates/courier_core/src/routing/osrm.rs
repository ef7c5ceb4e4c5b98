//! Route provider backed by OSRM's `/route` service.
//!
//! The HTTP client is kept separate from response parsing so the parsing and
//! instruction rules can be tested without a server.

mod client;
mod instruction;
mod parser;
mod response;

pub use client::OsrmRouteProvider;
pub use instruction::describe_maneuver;
