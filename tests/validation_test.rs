//! Input validation runs before any request.

use weub::ErrorCode;
use weub::types::validation::{
    MAX_DESCRIPTION_LENGTH, MAX_TAG_LENGTH, is_valid_uuid, validate_description, validate_tags,
    validate_title, validate_upload, validate_video_id,
};
use weub::types::{UploadLimits, UploadRequest};

#[test]
fn uuid_versions_one_through_five_are_accepted() {
    for version in ['1', '2', '3', '4', '5'] {
        let id = format!("3f1c2a4e-8b7d-{version}c3a-9e2f-1a2b3c4d5e6f");
        assert!(is_valid_uuid(&id), "{id}");
    }
    assert!(!is_valid_uuid("3f1c2a4e-8b7d-6c3a-9e2f-1a2b3c4d5e6f"));
}

#[test]
fn video_ids_with_path_characters_are_rejected() {
    for id in ["", "abc", "../../etc", "3f1c2a4e-8b7d-4c3a-9e2f-1a2b3c4d5e6f/status"] {
        assert_eq!(
            validate_video_id(id).unwrap_err().code(),
            ErrorCode::InvalidUuid,
            "{id:?}"
        );
    }
}

#[test]
fn description_and_tag_limits() {
    assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
    assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LENGTH + 1)).is_err());

    assert!(validate_tags(&["t".repeat(MAX_TAG_LENGTH)]).is_ok());
    assert!(validate_tags(&["t".repeat(MAX_TAG_LENGTH + 1)]).is_err());
    assert!(validate_tags(&[]).is_ok());
}

#[test]
fn titles_are_trimmed_before_checking() {
    assert!(validate_title("  Holiday  ").is_ok());
    assert_eq!(
        validate_title("").unwrap_err().code(),
        ErrorCode::MissingRequiredField
    );
}

#[test]
fn upload_formats_are_case_insensitive() {
    let limits = UploadLimits::default();
    for name in ["a.MP4", "b.mov", "c.WebM", "d.avi"] {
        let request = UploadRequest::new(name, vec![1u8; 4], "Clip");
        assert!(validate_upload(&request, &limits).is_ok(), "{name}");
    }
    let request = UploadRequest::new("noextension", vec![1u8; 4], "Clip");
    assert_eq!(
        validate_upload(&request, &limits).unwrap_err().code(),
        ErrorCode::InvalidFileFormat
    );
}

#[test]
fn upload_metadata_is_checked_too() {
    let limits = UploadLimits::default();
    let request = UploadRequest::new("clip.mp4", vec![1u8; 4], "Clip")
        .tag("cats")
        .tag("CATS");
    assert_eq!(
        validate_upload(&request, &limits).unwrap_err().code(),
        ErrorCode::InvalidInput
    );
}
