pub mod common;
pub mod lookup;
pub mod purge;
pub mod scan;
pub mod status;
pub mod watch;
