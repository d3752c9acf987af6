//! Blob store port
//!
//! Files are addressed by folder and name (lookup) or by an opaque id
//! (download/trash). Google Drive and a local directory both fit.

use serde::Serialize;

use crate::domain::result::Result;

pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file listed in a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl StoredFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// A file created by `upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    /// Link a reviewer can open
    pub link: String,
}

pub trait BlobStore: Send + Sync {
    /// Store name for logs (e.g., "drive", "local")
    fn name(&self) -> &str;

    /// Id of the first file in `folder_id` called `name`
    fn find(&self, folder_id: &str, name: &str) -> Result<Option<String>>;

    /// Every live entry in a folder, folders included
    fn list_all(&self, folder_id: &str) -> Result<Vec<StoredFile>>;

    /// Move a file to the trash
    fn trash(&self, file_id: &str) -> Result<()>;

    fn download(&self, file_id: &str) -> Result<Vec<u8>>;

    fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile>;

    /// Give a file a new name in the same folder, replacing any file the
    /// store keys by that name
    fn rename(&self, file_id: &str, new_name: &str) -> Result<UploadedFile>;
}
