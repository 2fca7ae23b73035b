pub mod models;
pub mod store;

pub use models::{JournalEntry, JournalKind, RequestOrigin, JOURNAL_VERSION};
pub use store::RecoveryJournal;
