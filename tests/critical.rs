//! Critical test matrix: data integrity, concurrent workers, crash recovery.
//!
//! Run with: `cargo test --test critical`

mod support;

#[path = "critical/data_corruption.rs"]
mod data_corruption;
#[path = "critical/persistence_recovery.rs"]
mod persistence_recovery;
#[path = "critical/race_conditions.rs"]
mod race_conditions;
#[path = "critical/crash_recovery.rs"]
mod crash_recovery;
