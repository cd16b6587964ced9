use agrivoice_core::AssistantError;
use agrivoice_providers::disease_detection::ImageFile;
use std::path::Path;

/// Image types the prediction service accepts, keyed by extension.
const IMAGE_TYPES: [(&str, &str); 7] = [
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
];

pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Reads a user-picked file for upload. Anything that is not an image is
/// refused here, before a request is built.
pub fn select_image(path: &Path) -> Result<ImageFile, AssistantError> {
    let mime_type = image_mime_type(path).ok_or_else(|| {
        AssistantError::UploadError(format!("not an image file: {}", path.display()))
    })?;

    let bytes = std::fs::read(path)
        .map_err(|e| AssistantError::UploadError(format!("read {}: {e}", path.display())))?;
    if bytes.is_empty() {
        return Err(AssistantError::UploadError(format!(
            "image file is empty: {}",
            path.display()
        )));
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    Ok(ImageFile {
        filename,
        mime_type: mime_type.into(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension_case_insensitively() {
        assert_eq!(image_mime_type(Path::new("a/leaf.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("leaf.webp")), Some("image/webp"));
        assert_eq!(image_mime_type(Path::new("notes.txt")), None);
        assert_eq!(image_mime_type(Path::new("README")), None);
    }

    #[test]
    fn selects_image_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tomato leaf.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let img = select_image(&path).unwrap();
        assert_eq!(img.filename, "tomato leaf.png");
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.bytes.len(), 4);
    }

    #[test]
    fn refuses_non_images_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("leaf.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert!(matches!(
            select_image(&text),
            Err(AssistantError::UploadError(_))
        ));

        let empty = dir.path().join("leaf.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            select_image(&empty),
            Err(AssistantError::UploadError(_))
        ));

        assert!(select_image(&dir.path().join("missing.jpg")).is_err());
    }
}
