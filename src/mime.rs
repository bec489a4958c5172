//! MIME type labels, grounded in `original_source/src/mime_type.cpp`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    TextPlain,
    TextHtml,
    TextCss,
    ApplicationJson,
    ApplicationOctetStream,
    ApplicationFormUrlEncoded,
    ImagePng,
    ImageJpeg,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::TextPlain => "text/plain",
            MimeType::TextHtml => "text/html",
            MimeType::TextCss => "text/css",
            MimeType::ApplicationJson => "application/json",
            MimeType::ApplicationOctetStream => "application/octet-stream",
            MimeType::ApplicationFormUrlEncoded => "application/x-www-form-urlencoded",
            MimeType::ImagePng => "image/png",
            MimeType::ImageJpeg => "image/jpeg",
        }
    }
}

impl Default for MimeType {
    fn default() -> Self {
        MimeType::ApplicationOctetStream
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_canonical_strings() {
        assert_eq!(MimeType::ApplicationJson.as_str(), "application/json");
        assert_eq!(MimeType::TextHtml.as_str(), "text/html");
    }

    #[test]
    fn default_is_octet_stream() {
        assert_eq!(MimeType::default(), MimeType::ApplicationOctetStream);
    }
}
