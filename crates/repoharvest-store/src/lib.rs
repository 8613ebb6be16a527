// SQLite-backed document store for harvested repositories
// Upserts are keyed by the platform's 64-bit repository id

pub mod store;

pub use store::{
    Document, PendingReadme, RepositoryStore, StoreError, StoredDocument, UpsertSummary,
};
