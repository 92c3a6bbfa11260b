//! Database layer for the sync store

mod connection;
mod migrations;
mod note_mappings;
mod sync_history;

pub use connection::Database;
pub use note_mappings::NoteMappingRepository;
pub use sync_history::SyncHistoryRepository;
