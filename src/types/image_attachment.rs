use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};
use crate::types::{ImagePart, Part};

/// Media types accepted for attachments.
pub const SUPPORTED_MIME_TYPES: [&str; 4] = ["image/gif", "image/jpeg", "image/png", "image/webp"];

/// An image waiting to be folded into the next user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Where the image was loaded from.
    pub path: PathBuf,

    /// Declared media type.
    pub mime_type: String,

    /// Base64-encoded file contents.
    pub data: String,

    /// Size of the file on disk.
    pub size_bytes: u64,
}

impl ImageAttachment {
    /// Validates, reads and encodes the image at `raw_path`.
    ///
    /// Surrounding quotes are removed and a leading `~/` is expanded to the
    /// home directory, so paths pasted from a shell work as typed.
    pub fn load(raw_path: &str, max_bytes: u64) -> Result<Self> {
        let path = expand_path(raw_path.trim().trim_matches(|c| c == '\'' || c == '"'));
        if !path.is_file() {
            return Err(Error::validation(
                format!("file not found: {}", path.display()),
                Some("path".to_string()),
            ));
        }

        let size_bytes = fs::metadata(&path)
            .map_err(|err| Error::io(format!("cannot stat {}", path.display()), err))?
            .len();
        if size_bytes > max_bytes {
            return Err(Error::validation(
                format!(
                    "image too large ({:.1} MB). Max {} MB",
                    size_bytes as f64 / (1024.0 * 1024.0),
                    max_bytes / (1024 * 1024)
                ),
                Some("path".to_string()),
            ));
        }

        let mime_type = mime_type_for(&path).ok_or_else(|| {
            Error::validation(
                format!(
                    "unsupported image type for '{}'. Supported: {}",
                    path.display(),
                    SUPPORTED_MIME_TYPES.join(", ")
                ),
                Some("path".to_string()),
            )
        })?;

        let raw = fs::read(&path)
            .map_err(|err| Error::io(format!("error reading image {}", path.display()), err))?;
        Ok(Self {
            path,
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(&raw),
            size_bytes,
        })
    }

    /// File name for prompts and status lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Converts the attachment into an inline image part.
    pub fn to_part(&self) -> Part {
        Part::Image(ImagePart::new(self.mime_type.clone(), self.data.clone()))
    }
}

fn expand_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_encodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.PNG");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"\x89PNG\r\n\x1a\n").unwrap();

        let image = ImageAttachment::load(path.to_str().unwrap(), 1024).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgo=");
        assert_eq!(image.size_bytes, 8);
        assert_eq!(image.file_name(), "dot.PNG");
    }

    #[test]
    fn quoted_paths_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.gif");
        fs::write(&path, b"GIF89a").unwrap();
        let quoted = format!("'{}'", path.display());
        assert!(ImageAttachment::load(&quoted, 1024).is_ok());
    }

    #[test]
    fn oversized_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        fs::write(&path, vec![0u8; 2048]).unwrap();
        let err = ImageAttachment::load(path.to_str().unwrap(), 1024).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let err = ImageAttachment::load(path.to_str().unwrap(), 1024).unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }

    #[test]
    fn missing_files_are_rejected() {
        let err = ImageAttachment::load("/definitely/not/here.png", 1024).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}
