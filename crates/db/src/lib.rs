pub mod models;
pub mod store;

pub use store::{
    DocumentStore, StoreError, memory::MemoryDocumentStore, sqlite::SqliteDocumentStore,
};
