//! Call dispatch
//!
//! Runs a batch of call attempts over the eligible borrowers: claim each
//! record, fan the attempts out under a parallelism cap, and fold the
//! outcomes into a `BatchSummary`.

mod dispatcher;

pub use dispatcher::CallDispatcher;
