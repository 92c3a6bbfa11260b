//! Data models for chatnote

mod event;
mod identity_mapping;
mod sync_record;

pub use event::SyncEvent;
pub use identity_mapping::IdentityMapping;
pub use sync_record::{fingerprint_of, format_mtime, SyncRecord};
