//! BorrowerStore - owner-scoped borrower records with atomic state transitions
//!
//! The store is the only shared mutable resource in the engine. All access
//! goes through a cloneable handle that sends commands to an actor task
//! owning the SQLite connection; claim/complete/fail are single conditional
//! UPDATE statements, which makes them atomic check-and-set operations.

mod manager;
mod messages;

pub use manager::BorrowerStore;
pub use messages::{ResetTarget, StoreCommand, StoreError, StoreResponse};
