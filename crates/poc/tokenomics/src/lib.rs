//! Tokenomics ledger for the PoC archive.
//!
//! A fixed supply is split across four sequential epochs. Each qualified
//! contribution draws a percentage of one epoch's remaining balance given by
//! its PoD score, shared between the metals legal in that epoch in
//! proportion to their multipliers. Cumulative coherence drives halvings of
//! the Founder balance.
//!
//! The ledger maintains
//! `Σ(initial − balance) = Σ rewards + halving_burned`
//! to within [`CONSERVATION_TOLERANCE`] of the total supply.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod config;
mod error;
mod ledger;
mod store;

pub use config::TokenomicsConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::{
    AllocationQuote, AllocationRecord, EpochInfo, LedgerState, LedgerStatistics, TokenLedger,
    CONSERVATION_TOLERANCE, DEFAULT_HISTORY_CAP,
};
pub use store::LedgerStore;
