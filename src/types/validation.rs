//! Input validation run before any request is sent.
//!
//! Every function here is synchronous and returns one of the validation
//! variants of [`WeubError`], so a rejected input never reaches the network.

use uuid::{Uuid, Variant};

use super::upload::{UploadLimits, UploadRequest};
use crate::{Result, WeubError};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LENGTH: usize = 50;

const TITLE_FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Hyphenated RFC 4122 UUID with a version nibble of 1–5.
pub fn is_valid_uuid(id: &str) -> bool {
    // Only the 36-char hyphenated form; try_parse also accepts simple/braced/urn.
    if id.len() != 36 {
        return false;
    }
    match Uuid::try_parse(id) {
        Ok(uuid) => {
            matches!(uuid.get_version_num(), 1..=5) && uuid.get_variant() == Variant::RFC4122
        }
        Err(_) => false,
    }
}

/// Reject a malformed video id with `INVALID_UUID`.
pub fn validate_video_id(id: &str) -> Result<()> {
    if is_valid_uuid(id) {
        Ok(())
    } else {
        Err(WeubError::InvalidUuid(id.to_string()))
    }
}

pub fn validate_title(title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WeubError::MissingRequiredField("title".into()));
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LENGTH {
        return Err(WeubError::InvalidInput(format!(
            "title is {len} characters (max {MAX_TITLE_LENGTH})"
        )));
    }
    if let Some(c) = title.chars().find(|c| TITLE_FORBIDDEN.contains(c)) {
        return Err(WeubError::InvalidInput(format!(
            "title contains invalid character '{c}'"
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_LENGTH {
        return Err(WeubError::InvalidInput(format!(
            "description is {len} characters (max {MAX_DESCRIPTION_LENGTH})"
        )));
    }
    Ok(())
}

/// Tags are compared case-insensitively after trimming.
pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(WeubError::InvalidInput(format!(
            "{} tags given (max {MAX_TAGS})",
            tags.len()
        )));
    }
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let normalized = tag.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(WeubError::InvalidInput("empty tag".into()));
        }
        if normalized.chars().count() > MAX_TAG_LENGTH {
            return Err(WeubError::InvalidInput(format!(
                "tag '{tag}' is longer than {MAX_TAG_LENGTH} characters"
            )));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
        {
            return Err(WeubError::InvalidInput(format!(
                "tag '{tag}' may only contain letters, numbers, spaces, hyphens and underscores"
            )));
        }
        if seen.contains(&normalized) {
            return Err(WeubError::InvalidInput(format!("duplicate tag '{tag}'")));
        }
        seen.push(normalized);
    }
    Ok(())
}

/// Validate the file and metadata of an upload against `limits`.
pub fn validate_upload(request: &UploadRequest, limits: &UploadLimits) -> Result<()> {
    if request.file_name.trim().is_empty() {
        return Err(WeubError::MissingRequiredField("file".into()));
    }
    let supported = request
        .extension()
        .is_some_and(|ext| limits.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)));
    if !supported {
        return Err(WeubError::InvalidFileFormat(format!(
            "'{}' is not one of: {}",
            request.file_name,
            limits.supported_formats.join(", ")
        )));
    }
    if request.size() > limits.max_file_size {
        return Err(WeubError::FileTooLarge {
            size: request.size(),
            max: limits.max_file_size,
        });
    }
    if request.size() == 0 {
        return Err(WeubError::InvalidInput(format!(
            "'{}' is empty",
            request.file_name
        )));
    }
    validate_title(&request.title)?;
    if let Some(description) = &request.description {
        validate_description(description)?;
    }
    validate_tags(&request.tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    const V4: &str = "3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f";

    #[test]
    fn accepts_hyphenated_v4() {
        assert!(is_valid_uuid(V4));
        assert!(is_valid_uuid(&V4.to_uppercase()));
        assert!(is_valid_uuid(&Uuid::new_v4().to_string()));
    }

    #[test]
    fn rejects_other_forms() {
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid(""));
        // simple (unhyphenated) form
        assert!(!is_valid_uuid("3f1c2a4e8b7d4c3a9e2f1a2b3c4d5e6f"));
        // version nibble 0
        assert!(!is_valid_uuid("3f1c2a4e-8b7d-0c3a-9e2f-1a2b3c4d5e6f"));
        // variant nibble c (Microsoft)
        assert!(!is_valid_uuid("3f1c2a4e-8b7d-4c3a-ce2f-1a2b3c4d5e6f"));
    }

    #[test]
    fn invalid_id_maps_to_invalid_uuid_code() {
        let err = validate_video_id("../etc/passwd").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidUuid);
    }

    #[test]
    fn title_rules() {
        assert!(validate_title("My holiday").is_ok());
        assert_eq!(
            validate_title("   ").unwrap_err().code(),
            ErrorCode::MissingRequiredField
        );
        assert!(validate_title("a/b").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tags(&["cats".into(), "funny-videos".into()]).is_ok());
        assert!(validate_tags(&["Cats".into(), "cats ".into()]).is_err());
        assert!(validate_tags(&["#hash".into()]).is_err());
        let many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(validate_tags(&many).is_err());
    }

    #[test]
    fn upload_format_and_size() {
        let limits = UploadLimits {
            max_file_size: 10,
            ..UploadLimits::default()
        };
        let ok = UploadRequest::new("clip.mp4", vec![0u8; 10], "Clip");
        assert!(validate_upload(&ok, &limits).is_ok());

        let big = UploadRequest::new("clip.mp4", vec![0u8; 11], "Clip");
        assert_eq!(
            validate_upload(&big, &limits).unwrap_err().code(),
            ErrorCode::FileTooLarge
        );

        let wrong = UploadRequest::new("clip.mkv", vec![0u8; 1], "Clip");
        assert_eq!(
            validate_upload(&wrong, &limits).unwrap_err().code(),
            ErrorCode::InvalidFileFormat
        );
    }
}
