//! Persistence for the easel API.
//!
//! SQLite (via rusqlite) holds the relational state: users, projects,
//! drawing rows and share ids, plus the thumbnail index. Bulk bytes —
//! drawing payloads and thumbnail images — live in a content-addressed
//! blob store behind the [`blobs::BlobStore`] trait, referenced from the
//! rows by SHA-256 hash. Repositories own all SQL; multi-step mutations run
//! inside transactions.

pub mod blobs;
pub mod db;
pub mod drawings;
pub mod projects;
pub mod thumbnails;
pub mod types;
pub mod users;

pub use blobs::{BlobError, BlobStore, FilesystemBlobStore, MemoryBlobStore};
pub use db::{Database, StoreError};
pub use drawings::DrawingRepository;
pub use projects::ProjectRepository;
pub use thumbnails::ThumbnailStore;
pub use users::UserRepository;
