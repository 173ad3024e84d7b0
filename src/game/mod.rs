//! Fishing game model
//!
//! Loop states, bait-count change detection, bucket-full detection and the
//! catch record store.

pub mod bucket;
pub mod records;
pub mod state;

pub use bucket::CastMonitor;
pub use records::{
    FileRecordSink, FishRecord, Quality, QualityCounts, RecordError, RecordSink, RecordStore,
    Scope, SessionSummary,
};
pub use state::{BaitChange, LoopState, RunState};
