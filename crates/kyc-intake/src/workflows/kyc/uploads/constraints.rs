use mime::Mime;

use super::super::domain::Attachment;

pub const DEFAULT_UPLOAD_MAX_MB: f64 = 10.0;

/// One token of an `accept` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptPattern {
    /// `.pdf`, stored without the leading dot.
    Extension(String),
    /// `image/*`, stored as the top-level type.
    MimeWildcard(String),
    /// `application/pdf`
    Mime(String),
}

impl AcceptPattern {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        if token.is_empty() {
            return None;
        }
        if let Some(ext) = token.strip_prefix('.') {
            return Some(Self::Extension(ext.to_string()));
        }
        if let Some(top_level) = token.strip_suffix("/*") {
            return Some(Self::MimeWildcard(top_level.to_string()));
        }
        Some(Self::Mime(token))
    }

    pub fn matches(&self, file: &Attachment) -> bool {
        let mime_type = file.mime_type().trim().to_ascii_lowercase();
        match self {
            Self::Extension(ext) => file.extension().as_deref() == Some(ext.as_str()),
            Self::MimeWildcard(top_level) => mime_type
                .parse::<Mime>()
                .map(|parsed| parsed.type_().as_str() == top_level)
                .unwrap_or(false),
            Self::Mime(exact) => match (mime_type.parse::<Mime>(), exact.parse::<Mime>()) {
                (Ok(actual), Ok(expected)) => actual.essence_str() == expected.essence_str(),
                _ => mime_type == *exact,
            },
        }
    }
}

/// Reasons a candidate file is refused by an upload slot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FileRejection {
    #[error("Tipo de arquivo não permitido")]
    UnsupportedType,
    #[error("O arquivo deve ter no máximo {max_mb}MB")]
    TooLarge { max_mb: f64 },
}

/// Accepted types plus size cap for one upload control.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConstraints {
    accept: Option<String>,
    patterns: Vec<AcceptPattern>,
    max_size_mb: f64,
}

impl Default for FileConstraints {
    fn default() -> Self {
        Self::new(None, DEFAULT_UPLOAD_MAX_MB)
    }
}

impl FileConstraints {
    /// `accept` uses the comma separated syntax of a file input, e.g. `.pdf,image/*`.
    pub fn new(accept: Option<&str>, max_size_mb: f64) -> Self {
        let patterns = accept
            .map(|raw| raw.split(',').filter_map(AcceptPattern::parse).collect())
            .unwrap_or_default();

        Self {
            accept: accept.map(str::to_string),
            patterns,
            max_size_mb,
        }
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn patterns(&self) -> &[AcceptPattern] {
        &self.patterns
    }

    pub fn max_size_mb(&self) -> f64 {
        self.max_size_mb
    }

    /// Type is checked before size; the first failure wins.
    pub fn validate(&self, file: &Attachment) -> Result<(), FileRejection> {
        if !self.accepts_type(file) {
            return Err(FileRejection::UnsupportedType);
        }
        if file.size_mb() > self.max_size_mb {
            return Err(FileRejection::TooLarge {
                max_mb: self.max_size_mb,
            });
        }
        Ok(())
    }

    fn accepts_type(&self, file: &Attachment) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|pattern| pattern.matches(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    fn file(name: &str, mime_type: &str, size: usize) -> Attachment {
        Attachment::new(name, mime_type, vec![0u8; size])
    }

    fn document_policy() -> FileConstraints {
        FileConstraints::new(Some(".pdf,.jpg,.png"), 5.0)
    }

    #[test]
    fn four_megabyte_pdf_passes_document_policy() {
        let scan = file("rg-frente.pdf", "application/pdf", 4 * MB);
        assert_eq!(document_policy().validate(&scan), Ok(()));
    }

    #[test]
    fn six_megabyte_pdf_is_too_large() {
        let scan = file("rg-frente.pdf", "application/pdf", 6 * MB);
        let rejection = document_policy().validate(&scan).unwrap_err();
        assert_eq!(rejection, FileRejection::TooLarge { max_mb: 5.0 });
        assert_eq!(rejection.to_string(), "O arquivo deve ter no máximo 5MB");
    }

    #[test]
    fn text_file_fails_type_check_under_the_cap() {
        let notes = file("notes.txt", "text/plain", 10);
        let rejection = document_policy().validate(&notes).unwrap_err();
        assert_eq!(rejection, FileRejection::UnsupportedType);
        assert_eq!(rejection.to_string(), "Tipo de arquivo não permitido");
    }

    #[test]
    fn type_mismatch_is_reported_before_size() {
        let huge_text = file("dump.txt", "text/plain", 8 * MB);
        assert_eq!(
            document_policy().validate(&huge_text),
            Err(FileRejection::UnsupportedType)
        );
    }

    #[test]
    fn mime_patterns_match_case_insensitively() {
        let policy = FileConstraints::new(Some("image/*, APPLICATION/PDF"), 5.0);
        assert!(policy.validate(&file("photo", "IMAGE/PNG", 10)).is_ok());
        assert!(policy.validate(&file("scan", "application/pdf", 10)).is_ok());
        assert!(policy.validate(&file("clip", "video/mp4", 10)).is_err());
        assert!(policy.validate(&file("photo.jpg", "", 10)).is_err());
    }

    #[test]
    fn extension_match_ignores_mime() {
        let policy = FileConstraints::new(Some(".JPG"), 5.0);
        assert!(policy.validate(&file("selfie.jpg", "", 10)).is_ok());
    }

    #[test]
    fn missing_accept_list_admits_any_type() {
        let policy = FileConstraints::default();
        assert!(policy.patterns().is_empty());
        assert!(policy.validate(&file("archive.zip", "application/zip", MB)).is_ok());
        assert_eq!(
            policy.validate(&file("archive.zip", "application/zip", 11 * MB)),
            Err(FileRejection::TooLarge { max_mb: 10.0 })
        );
    }
}
