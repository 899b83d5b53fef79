use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// An image selected for deposit but not yet classified.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub captured_at: DateTime<Local>,
}

impl PendingItem {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            captured_at: Local::now(),
        }
    }

    /// Build an item from raw bytes, guessing the MIME type from the file name.
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime_type = guess_mime_type(&file_name);
        Self::new(bytes, file_name, mime_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Holds at most one pending image. Cloning yields another handle to the same slot.
#[derive(Debug, Clone, Default)]
pub struct CaptureStage {
    slot: Arc<Mutex<Option<PendingItem>>>,
}

impl CaptureStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was pending. No validation happens here; the
    /// classification service is the one that rejects bad input.
    pub fn select_image(&self, item: PendingItem) {
        log::debug!("Selected {} ({} bytes)", item.file_name, item.len());
        *self.lock() = Some(item);
    }

    pub async fn select_file(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "item".to_string());
        self.select_image(PendingItem::from_bytes(bytes, file_name));
        Ok(())
    }

    pub fn has_pending_item(&self) -> bool {
        self.lock().is_some()
    }

    pub fn pending_item(&self) -> Option<PendingItem> {
        self.lock().clone()
    }

    /// Identifies the pending item without copying its bytes.
    pub fn pending_key(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .map(|item| format!("{}@{}", item.file_name, item.captured_at.to_rfc3339()))
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    /// Clear the slot only if it still holds `item`; a newer selection stays.
    pub fn clear_consumed(&self, item: &PendingItem) {
        let mut slot = self.lock();
        if slot.as_ref() == Some(item) {
            slot.take();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingItem>> {
        // A panic while holding the guard cannot leave the Option half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_selection_replaces_pending_item() {
        let stage = CaptureStage::new();
        assert!(!stage.has_pending_item());

        stage.select_image(PendingItem::from_bytes(vec![1, 2, 3], "first.jpg"));
        stage.select_image(PendingItem::from_bytes(vec![9], "second.png"));

        let pending = stage.pending_item().unwrap();
        assert_eq!(pending.file_name, "second.png");
        assert_eq!(pending.bytes, vec![9]);
        assert_eq!(pending.mime_type, "image/png");
    }

    #[test]
    fn test_clones_share_the_same_slot() {
        let stage = CaptureStage::new();
        let handle = stage.clone();
        stage.select_image(PendingItem::from_bytes(vec![0; 4], "item.jpeg"));
        assert!(handle.has_pending_item());

        handle.clear();
        assert!(!stage.has_pending_item());
        assert_eq!(stage.pending_key(), None);
    }

    #[test]
    fn test_clear_consumed_keeps_newer_selection() {
        let stage = CaptureStage::new();
        let first = PendingItem::from_bytes(vec![1], "first.jpg");
        stage.select_image(first.clone());
        stage.select_image(PendingItem::from_bytes(vec![2], "second.jpg"));

        stage.clear_consumed(&first);
        assert_eq!(stage.pending_item().unwrap().file_name, "second.jpg");

        let second = stage.pending_item().unwrap();
        stage.clear_consumed(&second);
        assert!(!stage.has_pending_item());
    }

    #[test]
    fn test_pending_key_tracks_selection() {
        let stage = CaptureStage::new();
        stage.select_image(PendingItem::from_bytes(vec![1], "a.jpg"));
        let first = stage.pending_key().unwrap();
        assert!(first.starts_with("a.jpg@"));

        stage.select_image(PendingItem::from_bytes(vec![2], "b.jpg"));
        assert_ne!(stage.pending_key().unwrap(), first);
    }

    #[test]
    fn test_mime_type_guessing() {
        assert_eq!(guess_mime_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime_type("scan.webp"), "image/webp");
        assert_eq!(guess_mime_type("blob"), "application/octet-stream");
        assert_eq!(guess_mime_type("notes.txt"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_select_file_reads_bytes_without_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("not-really-an-image.txt");
        std::fs::write(&path, b"hello").unwrap();

        let stage = CaptureStage::new();
        stage.select_file(&path).await.unwrap();

        let pending = stage.pending_item().unwrap();
        assert_eq!(pending.bytes, b"hello");
        assert_eq!(pending.file_name, "not-really-an-image.txt");
    }

    #[tokio::test]
    async fn test_select_missing_file_keeps_previous_item() {
        let stage = CaptureStage::new();
        stage.select_image(PendingItem::from_bytes(vec![7], "kept.jpg"));

        let result = stage.select_file(Path::new("/definitely/not/here.jpg")).await;
        assert!(result.is_err());
        assert_eq!(stage.pending_item().unwrap().file_name, "kept.jpg");
    }
}
