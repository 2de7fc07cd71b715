//! Sync runs, manual transitions and persisted state.

pub mod engine;
pub mod manual;
pub mod state;

pub use engine::{BundleOutcome, LaneOperation, ScanRun, SyncEngine, SyncRun};
pub use manual::{
    ManualAction, ManualBatch, ManualFailure, ManualOptions, ManualOutcome, activate, deactivate,
    run_batch,
};
pub use state::{BundleChange, StateOrigin, SyncRecord, SyncState, SyncStateStore};
