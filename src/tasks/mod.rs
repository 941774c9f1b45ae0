//! Background tasks

mod purge;

pub use purge::{PurgeScheduler, PurgeTarget};
