//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The engine
//! depends only on these traits, not on concrete implementations.

mod blob_store;
mod forms;
mod observer;
mod workbook;

pub use blob_store::{BlobStore, StoredFile, UploadedFile, FOLDER_MIME_TYPE, XLSX_MIME_TYPE};
pub use forms::{FormResponseSource, ResponseQuery};
pub use observer::{MemoryObserver, NullObserver, RunObserver};
pub use workbook::{WorkbookSink, WorkbookSource};
