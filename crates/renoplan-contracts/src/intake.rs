use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SUPPORTED_IMAGE_MIMES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub fn is_supported_image_mime(mime: &str) -> bool {
    SUPPORTED_IMAGE_MIMES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(mime.trim()))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// One intaken property photo: base64 payload for the generation request plus
/// a display-ready data URL. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: String,
    pub mime_type: String,
    pub base64_data: String,
    pub data_url: String,
}

impl ImageAsset {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let base64_data = BASE64.encode(bytes);
        let data_url = format!("data:{mime_type};base64,{base64_data}");
        Self {
            id: Uuid::new_v4().to_string(),
            mime_type: mime_type.to_string(),
            base64_data,
            data_url,
        }
    }

    /// Reads one file into an asset. Returns `Ok(None)` for unsupported mime
    /// types so the caller can skip with a warning instead of failing intake.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let Some(mime_type) = mime_for_path(path) else {
            return Ok(None);
        };
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(Self::from_bytes(mime_type, &bytes)))
    }
}

/// Ordered, session-scoped asset list. Assets append in completion order,
/// which need not match the order files were offered.
#[derive(Debug, Clone, Default)]
pub struct IntakeList {
    assets: Vec<ImageAsset>,
}

impl IntakeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: ImageAsset) {
        self.assets.push(asset);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.assets.len();
        self.assets.retain(|asset| asset.id != id);
        self.assets.len() != before
    }

    pub fn reset(&mut self) {
        self.assets.clear();
    }

    pub fn assets(&self) -> &[ImageAsset] {
        self.assets.as_slice()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{is_supported_image_mime, mime_for_path, ImageAsset, IntakeList};

    #[test]
    fn asset_from_bytes_exposes_payload_and_data_url() {
        let asset = ImageAsset::from_bytes("image/png", b"png-bytes");
        assert_eq!(asset.mime_type, "image/png");
        assert!(!asset.base64_data.is_empty());
        assert_eq!(
            asset.data_url,
            format!("data:image/png;base64,{}", asset.base64_data)
        );
    }

    #[test]
    fn asset_ids_are_unique_per_intake() {
        let first = ImageAsset::from_bytes("image/jpeg", b"a");
        let second = ImageAsset::from_bytes("image/jpeg", b"a");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn unsupported_extension_is_skipped_not_failed() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"not an image")?;
        assert!(ImageAsset::from_path(&path)?.is_none());
        Ok(())
    }

    #[test]
    fn supported_extension_is_read() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("facade.jpg");
        std::fs::write(&path, b"jpeg-bytes")?;
        let asset = ImageAsset::from_path(&path)?.expect("jpeg should intake");
        assert_eq!(asset.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn mime_filtering_covers_the_supported_set() {
        assert!(is_supported_image_mime("image/jpeg"));
        assert!(is_supported_image_mime("IMAGE/PNG"));
        assert!(!is_supported_image_mime("application/pdf"));
        assert_eq!(mime_for_path(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("a.gif")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn intake_list_preserves_order_and_supports_removal() {
        let mut list = IntakeList::new();
        let first = ImageAsset::from_bytes("image/jpeg", b"one");
        let second = ImageAsset::from_bytes("image/png", b"two");
        let first_id = first.id.clone();
        list.push(first);
        list.push(second);
        assert_eq!(list.len(), 2);
        assert_eq!(list.assets()[0].id, first_id);

        assert!(list.remove(&first_id));
        assert!(!list.remove(&first_id));
        assert_eq!(list.len(), 1);

        list.reset();
        assert!(list.is_empty());
    }
}
