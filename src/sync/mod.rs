//! Versioned State Synchronization
//!
//! Checksummed, versioned session state with bounded history,
//! checkpoints, rollback and diffing. The orchestrator commits game
//! updates here and resynchronizes clients that drift.

pub mod engine;

pub use engine::{
    Checkpoint, ExportedState, HistoryEntry, SessionStateInfo, StateSnapshot, SyncConfig,
    SyncError, SyncResponse, SyncStats, StateSynchronizer, UpdateReceipt,
};
