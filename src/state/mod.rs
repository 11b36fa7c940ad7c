//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `ResumeLedger`: durable set of item URLs already processed, used to skip
//!   work on restart and to deduplicate discovery

mod ledger;

pub use ledger::ResumeLedger;
