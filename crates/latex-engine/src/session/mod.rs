//! Upload sessions: token policy, archive storage and per-token locking

pub mod locks;
pub mod store;
pub mod token;

pub use locks::{SessionGuard, SessionLocks};
pub use store::{ArchiveCleanup, UploadStore};
pub use token::{PrefixPolicy, SessionToken, TokenPolicy};
