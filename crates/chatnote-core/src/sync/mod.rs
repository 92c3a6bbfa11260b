//! Idempotent sync protocol: change classifier, identity ledger, engine.

mod classifier;
mod engine;
mod identity;
mod ledger;
mod locks;

pub use classifier::{ChangeClassifier, ReadFailurePolicy};
pub use engine::{
    FailureReason, SkipReason, SyncEngine, SyncEngineConfig, SyncOutcome, SyncReport,
};
pub use identity::IdentityResolver;
pub use ledger::{DedupeLedger, IdentityLedger, MemoryDedupeLedger, MemoryIdentityLedger};
pub use locks::{KeyGuard, KeyedLocks};
