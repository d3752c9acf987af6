//! Directory-backed blob store
//!
//! Folder ids are subdirectories of the root and file ids are
//! `folder/name`. Trash is a `.trash` directory under the root. Uploads
//! are written to a temp file in the target folder and renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::result::{Error, Result};
use crate::ports::{BlobStore, StoredFile, UploadedFile, FOLDER_MIME_TYPE, XLSX_MIME_TYPE};

const TRASH_DIR: &str = ".trash";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::storage(format!("{} {}: {}", action, path.display(), e))
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("xlsx") => XLSX_MIME_TYPE,
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// A single relative path segment sequence with no parent or root jumps
fn check_relative(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && Path::new(id)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(Error::validation(format!("Invalid store path: {}", id)))
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(Error::validation(format!("Invalid file name: {}", name)));
    }
    Ok(())
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error("Failed to create", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        check_relative(id)?;
        Ok(self.root.join(id))
    }

    fn file_id(folder_id: &str, name: &str) -> String {
        format!("{}/{}", folder_id.trim_end_matches('/'), name)
    }
}

impl BlobStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn find(&self, folder_id: &str, name: &str) -> Result<Option<String>> {
        let id = Self::file_id(folder_id, name);
        Ok(self.resolve(&id)?.is_file().then_some(id))
    }

    fn list_all(&self, folder_id: &str) -> Result<Vec<StoredFile>> {
        let dir = self.resolve(folder_id)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| io_error("Failed to list", &dir, e))? {
            let entry = entry.map_err(|e| io_error("Failed to list", &dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            files.push(StoredFile {
                id: Self::file_id(folder_id, &name),
                mime_type: if path.is_dir() {
                    FOLDER_MIME_TYPE.to_string()
                } else {
                    mime_for(&path).to_string()
                },
                name,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn trash(&self, file_id: &str) -> Result<()> {
        let source = self.resolve(file_id)?;
        if !source.exists() {
            return Err(Error::not_found(format!("No stored file {}", file_id)));
        }

        let mut target = self.root.join(TRASH_DIR).join(file_id);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("Failed to create", parent, e))?;
        }
        let mut n = 1;
        while target.exists() {
            target = self.root.join(TRASH_DIR).join(format!("{}.{}", file_id, n));
            n += 1;
        }
        fs::rename(&source, &target).map_err(|e| io_error("Failed to trash", &source, e))
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(file_id)?;
        if !path.is_file() {
            return Err(Error::not_found(format!("No stored file {}", file_id)));
        }
        fs::read(&path).map_err(|e| io_error("Failed to read", &path, e))
    }

    fn upload(
        &self,
        folder_id: &str,
        name: &str,
        _mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile> {
        check_name(name)?;
        let dir = self.resolve(folder_id)?;
        fs::create_dir_all(&dir).map_err(|e| io_error("Failed to create", &dir, e))?;

        let target = dir.join(name);
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| io_error("Failed to stage", &dir, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| io_error("Failed to write", tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| io_error("Failed to publish", &target, e.error))?;

        Ok(UploadedFile {
            id: Self::file_id(folder_id, name),
            name: name.to_string(),
            link: format!("file://{}", target.display()),
        })
    }

    fn rename(&self, file_id: &str, new_name: &str) -> Result<UploadedFile> {
        check_name(new_name)?;
        let source = self.resolve(file_id)?;
        if !source.is_file() {
            return Err(Error::not_found(format!("No stored file {}", file_id)));
        }
        let folder_id = Path::new(file_id)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let target = source.with_file_name(new_name);
        fs::rename(&source, &target).map_err(|e| io_error("Failed to rename", &source, e))?;

        Ok(UploadedFile {
            id: Self::file_id(&folder_id, new_name),
            name: new_name.to_string(),
            link: format!("file://{}", target.display()),
        })
    }
}
