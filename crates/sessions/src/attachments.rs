//! Content-addressed blob storage for assistant-produced image attachments.
//!
//! User-uploaded attachments stay inline as data URLs on the message; only
//! images the assistant produces get rewritten to a `path` under a blob
//! directory, named by `sha256(bytes)` so re-persisting identical bytes is a
//! no-op.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use wingman_protocol::{Attachment, AttachmentKind};

use crate::error::Result;

/// Blob directory for assistant image attachments, rooted at a workspace's
/// `.wingman` directory.
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn blob_path(&self, digest: &str, ext: &str) -> PathBuf {
        if ext.is_empty() {
            self.dir.join(digest)
        } else {
            self.dir.join(format!("{digest}.{ext}"))
        }
    }

    /// Persist `bytes` under a content-addressed name, returning the path
    /// relative to the blob directory. A second call with identical bytes
    /// returns the same path without rewriting the file.
    pub async fn persist(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let digest = hex_sha256(bytes);
        let ext = extension_for_mime(mime_type);
        let path = self.blob_path(&digest, ext);
        let dir = self.dir.clone();
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir)?;
            if !path.exists() {
                std::fs::write(&path, &bytes)?;
            }
            Ok(())
        })
        .await??;

        Ok(file_name(&self.blob_path(&digest, ext)))
    }

    /// Rewrite an assistant-produced image attachment carrying an inline
    /// `dataUrl` to reference its blobbed `path` instead. Non-image
    /// attachments, and attachments already carrying a `path` or a remote
    /// URL, are left untouched.
    pub async fn blob_assistant_image(&self, attachment: &mut Attachment) -> Result<()> {
        if attachment.kind != AttachmentKind::Image || attachment.path.is_some() {
            return Ok(());
        }
        let Some(data_url) = attachment.data_url.as_deref() else {
            return Ok(());
        };
        let Some((mime_type, bytes)) = decode_data_url(data_url) else {
            return Ok(());
        };

        let relative = self.persist(&bytes, &mime_type).await?;
        attachment.path = Some(relative);
        attachment.data_url = None;
        attachment.mime_type = mime_type;
        attachment.size = Some(bytes.len() as u64);
        Ok(())
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "",
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL. Remote (`http(s)://`) URLs
/// return `None` and are never rewritten.
fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?.to_string();
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload).ok()?;
    Some((mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_data_url() -> String {
        let bytes = b"not really a png";
        let encoded =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        format!("data:image/png;base64,{encoded}")
    }

    #[tokio::test]
    async fn persisting_identical_bytes_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let a = store.persist(b"hello", "image/png").await.unwrap();
        let b = store.persist(b"hello", "image/png").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn different_bytes_produce_different_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let a = store.persist(b"hello", "image/png").await.unwrap();
        let b = store.persist(b"world", "image/png").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn blob_assistant_image_rewrites_data_url_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let mut attachment = Attachment {
            kind: AttachmentKind::Image,
            data_url: Some(png_data_url()),
            path: None,
            mime_type: "image/png".to_string(),
            name: None,
            size: None,
        };

        store.blob_assistant_image(&mut attachment).await.unwrap();

        assert!(attachment.data_url.is_none());
        assert!(attachment.path.is_some());
        assert!(attachment.path.as_deref().unwrap().ends_with(".png"));
        assert_eq!(attachment.size, Some(17));
    }

    #[tokio::test]
    async fn non_image_attachments_are_never_blobbed() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let mut attachment = Attachment {
            kind: AttachmentKind::File,
            data_url: Some("data:text/plain;base64,aGVsbG8=".to_string()),
            path: None,
            mime_type: "text/plain".to_string(),
            name: Some("notes.txt".to_string()),
            size: None,
        };

        store.blob_assistant_image(&mut attachment).await.unwrap();
        assert!(attachment.path.is_none());
        assert!(attachment.data_url.is_some());
    }

    #[tokio::test]
    async fn two_assistant_messages_sharing_an_image_dedup_to_one_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());
        let data_url = png_data_url();

        let mut first = Attachment {
            kind: AttachmentKind::Image,
            data_url: Some(data_url.clone()),
            path: None,
            mime_type: "image/png".to_string(),
            name: None,
            size: None,
        };
        let mut second = Attachment {
            kind: AttachmentKind::Image,
            data_url: Some(data_url),
            path: None,
            mime_type: "image/png".to_string(),
            name: None,
            size: None,
        };

        store.blob_assistant_image(&mut first).await.unwrap();
        store.blob_assistant_image(&mut second).await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(first.size, second.size);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn remote_urls_are_never_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let mut attachment = Attachment {
            kind: AttachmentKind::Image,
            data_url: Some("https://example.com/cat.png".to_string()),
            path: None,
            mime_type: "image/png".to_string(),
            name: None,
            size: None,
        };

        store.blob_assistant_image(&mut attachment).await.unwrap();
        assert!(attachment.path.is_none());
        assert_eq!(
            attachment.data_url.as_deref(),
            Some("https://example.com/cat.png")
        );
    }
}
