use crate::error::{Error, Result};

/// One typed segment of a multi-part turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Plain text.
    Text(String),

    /// An inline, base64-encoded image.
    Image(ImagePart),
}

/// An inline image carried inside a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// Declared media type, e.g. `image/png`.
    pub mime_type: String,

    /// Base64-encoded image bytes.
    pub data: String,
}

impl Part {
    /// Returns the text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::Image(_) => None,
        }
    }
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Builds an image part from base64 data whose media type was not
    /// recorded, guessing the type from the encoded magic bytes.
    pub fn from_base64_sniffed(data: impl Into<String>) -> Self {
        let data = data.into();
        let mime_type = if data.starts_with("iVBOR") {
            "image/png"
        } else if data.starts_with("R0lG") {
            "image/gif"
        } else if data.starts_with("UklGR") {
            "image/webp"
        } else {
            "image/jpeg"
        };
        Self::new(mime_type, data)
    }

    /// Parses a `data:<mime>;base64,<data>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let invalid = || {
            Error::validation(
                "image_url must be a base64 data URI",
                Some("image_url".to_string()),
            )
        };
        let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
        let (mime_type, data) = rest.split_once(";base64,").ok_or_else(invalid)?;
        if mime_type.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(mime_type, data))
    }

    /// Renders the image as a data URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let part = ImagePart::new("image/png", "iVBORw0KGgo=");
        let uri = part.data_uri();
        assert_eq!(uri, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(ImagePart::from_data_uri(&uri).unwrap(), part);
    }

    #[test]
    fn remote_urls_are_rejected() {
        let err = ImagePart::from_data_uri("https://example.com/cat.png").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn sniffing_recognizes_common_formats() {
        assert_eq!(
            ImagePart::from_base64_sniffed("iVBORw0KGgo").mime_type,
            "image/png"
        );
        assert_eq!(
            ImagePart::from_base64_sniffed("R0lGODlh").mime_type,
            "image/gif"
        );
        assert_eq!(
            ImagePart::from_base64_sniffed("UklGRiQAAABXRUJQ").mime_type,
            "image/webp"
        );
        assert_eq!(
            ImagePart::from_base64_sniffed("/9j/4AAQ").mime_type,
            "image/jpeg"
        );
    }
}
