//! ticketdb core - shared abstractions for the ticket-tracker data layer
//!
//! This crate provides the types every other ticketdb crate depends on:
//!
//! - `Connection` / `Transaction` - traits implemented by backing-store drivers
//! - `ConnectionFactory` - how the pool creates new connections
//! - `Statement` - an immutable, parameterized query request
//! - `QueryOutcome` - rows, or the explicit "no result set" marker
//! - `DbError` - the error taxonomy shared by pool, executor and models

mod connection;
mod error;
pub mod security;
mod statement;
mod types;

pub use connection::*;
pub use error::*;
pub use security::*;
pub use statement::*;
pub use types::*;
