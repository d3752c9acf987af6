//! Google Drive v3 blob store
//!
//! Plain REST over the blocking reqwest client with a bearer access token.
//! Shared-drive flags are always on so folders on team drives resolve.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::ports::{BlobStore, StoredFile, UploadedFile};

const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    name: String,
    web_view_link: Option<String>,
}

impl From<CreatedFile> for UploadedFile {
    fn from(file: CreatedFile) -> Self {
        UploadedFile {
            link: file.web_view_link.unwrap_or_default(),
            id: file.id,
            name: file.name,
        }
    }
}

/// Escape a value for a Drive query string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn children_query(folder_id: &str, name: Option<&str>) -> String {
    let mut q = format!("{} in parents and trashed=false", quote(folder_id));
    if let Some(name) = name {
        q.push_str(&format!(" and name={}", quote(name)));
    }
    q
}

/// `multipart/related` upload body: JSON metadata part, then the media part
fn multipart_body(boundary: &str, metadata: &serde_json::Value, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = metadata,
            mime = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

pub struct DriveStore {
    client: Client,
    access_token: String,
    api_url: String,
    upload_url: String,
}

impl DriveStore {
    pub fn new(access_token: &str) -> Result<Self> {
        Self::new_with_urls(access_token, DRIVE_API_URL, DRIVE_UPLOAD_URL)
    }

    pub fn new_with_urls(access_token: &str, api_url: &str, upload_url: &str) -> Result<Self> {
        if access_token.trim().is_empty() {
            anyhow::bail!("Drive access token cannot be empty (set storage.driveAccessToken or REIMBURSE_DRIVE_TOKEN)");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
        })
    }

    fn send(&self, request: RequestBuilder, what: &str) -> DomainResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| DomainError::storage(format!("Drive {} failed: {}", what, e)))?;
        match response.status().as_u16() {
            200..=299 => Ok(response),
            401 | 403 => Err(DomainError::auth(format!(
                "Drive {} rejected (HTTP {}); the access token may be expired",
                what,
                response.status().as_u16()
            ))),
            404 => Err(DomainError::not_found(format!("Drive {}: not found", what))),
            status => Err(DomainError::storage(format!("Drive {} failed: HTTP {}", what, status))),
        }
    }

    fn list(&self, q: &str) -> DomainResult<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", q.to_string()),
                ("fields", "nextPageToken, files(id, name, mimeType)".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
                ("supportsAllDrives", "true".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }
            let request = self.client.get(format!("{}/files", self.api_url)).query(&params);
            let page: FileList = self
                .send(request, "list")?
                .json()
                .map_err(|e| DomainError::storage(format!("Drive list response unreadable: {}", e)))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }
}

impl BlobStore for DriveStore {
    fn name(&self) -> &str {
        "drive"
    }

    fn find(&self, folder_id: &str, name: &str) -> DomainResult<Option<String>> {
        Ok(self
            .list(&children_query(folder_id, Some(name)))?
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| f.id))
    }

    fn list_all(&self, folder_id: &str) -> DomainResult<Vec<StoredFile>> {
        Ok(self
            .list(&children_query(folder_id, None))?
            .into_iter()
            .map(|f| StoredFile {
                id: f.id,
                name: f.name,
                mime_type: f.mime_type,
            })
            .collect())
    }

    fn trash(&self, file_id: &str) -> DomainResult<()> {
        let request = self
            .client
            .patch(format!("{}/files/{}", self.api_url, file_id))
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({"trashed": true}));
        self.send(request, "trash")?;
        Ok(())
    }

    fn download(&self, file_id: &str) -> DomainResult<Vec<u8>> {
        let request = self
            .client
            .get(format!("{}/files/{}", self.api_url, file_id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let bytes = self
            .send(request, "download")?
            .bytes()
            .map_err(|e| DomainError::storage(format!("Drive download interrupted: {}", e)))?;
        Ok(bytes.to_vec())
    }

    fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> DomainResult<UploadedFile> {
        let boundary = format!("reimburse-{}", Uuid::new_v4().simple());
        let metadata = json!({"name": name, "parents": [folder_id]});
        let request = self
            .client
            .post(format!("{}/files", self.upload_url))
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id, name, webViewLink"),
            ])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(multipart_body(&boundary, &metadata, mime_type, bytes));

        let created: CreatedFile = self
            .send(request, "upload")?
            .json()
            .map_err(|e| DomainError::storage(format!("Drive upload response unreadable: {}", e)))?;
        Ok(created.into())
    }

    /// Drive keys files by id, so same-named files are left for the caller
    fn rename(&self, file_id: &str, new_name: &str) -> DomainResult<UploadedFile> {
        let request = self
            .client
            .patch(format!("{}/files/{}", self.api_url, file_id))
            .query(&[("supportsAllDrives", "true"), ("fields", "id, name, webViewLink")])
            .json(&json!({"name": new_name}));
        let renamed: CreatedFile = self
            .send(request, "rename")?
            .json()
            .map_err(|e| DomainError::storage(format!("Drive rename response unreadable: {}", e)))?;
        Ok(renamed.into())
    }
}
