//! Long-lived services shared by every front end.

mod sync_store;

pub use sync_store::SyncStore;
