//! Archive-first content store.
//!
//! The archive is the system of record for every contribution ever
//! submitted, in every lifecycle state. Nothing is deleted except explicit
//! test-data cleanup, so redundancy checks always see the full history.
//!
//! Mutations are copy-on-write: the next state is built beside the current
//! one, persisted as a full snapshot, and only then published. A failed write
//! leaves both memory and disk on the previous state.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod state;
mod store;

pub use error::{ArchiveError, ArchiveResult};
pub use state::{ArchiveQuery, ArchiveState, ArchiveStatistics};
pub use store::ContentStore;
