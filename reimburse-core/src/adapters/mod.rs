//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Form-response HTTP client for FormResponseSource
//! - Google Drive REST and a local directory for BlobStore
//! - calamine / rust_xlsxwriter for the workbook ports
//! - CSV export of the payment ledger

pub mod csv_export;
pub mod drive;
pub mod forms_api;
pub mod local_store;
pub mod xlsx;

#[cfg(test)]
pub mod forms_mock;

pub use drive::DriveStore;
pub use forms_api::FormsApiClient;
pub use local_store::LocalStore;
pub use xlsx::XlsxCodec;
