//! Image payload encoding for pin attachments
//!
//! Accepts up to five image files per pin, each capped at 5 MiB, and
//! converts them to inline data-URL payloads. Every rejected file gets
//! a per-file reason so the caller can surface it; accepted files keep
//! their submission order.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use thiserror::Error;

/// Maximum number of images per pin
pub const MAX_IMAGES: usize = 5;

/// Maximum size of a single source file, before encoding
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// An uploaded file before encoding
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reason an uploaded file was not encoded
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("not an image")]
    NotAnImage,

    #[error("larger than {MAX_IMAGE_BYTES} bytes ({size} bytes)")]
    TooLarge { size: usize },

    #[error("more than {MAX_IMAGES} images per spot")]
    OverCap,
}

/// A rejected file with its reason, surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRejection {
    pub file_name: String,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Outcome of an encode batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct EncodedImages {
    /// Data-URL payloads, in accepted-input order
    pub encoded: Vec<String>,
    pub rejected: Vec<ImageRejection>,
}

/// Encode a batch of uploaded files into data-URL payloads
///
/// Files are considered in submission order: invalid types and
/// oversized files are rejected with a reason, valid files are encoded
/// until the per-pin cap is reached, and anything valid past the cap is
/// rejected as over-cap.
pub fn encode_images(files: Vec<ImageFile>) -> EncodedImages {
    let mut out = EncodedImages::default();

    for file in files {
        if !file.content_type.starts_with("image/") {
            out.rejected.push(ImageRejection {
                file_name: file.file_name,
                reason: RejectReason::NotAnImage,
            });
            continue;
        }

        if file.bytes.len() > MAX_IMAGE_BYTES {
            out.rejected.push(ImageRejection {
                file_name: file.file_name,
                reason: RejectReason::TooLarge {
                    size: file.bytes.len(),
                },
            });
            continue;
        }

        if out.encoded.len() >= MAX_IMAGES {
            out.rejected.push(ImageRejection {
                file_name: file.file_name,
                reason: RejectReason::OverCap,
            });
            continue;
        }

        out.encoded.push(encode_data_url(&file));
    }

    out
}

fn encode_data_url(file: &ImageFile) -> String {
    format!(
        "data:{};base64,{}",
        file.content_type,
        BASE64.encode(&file.bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, content_type: &str, len: usize) -> ImageFile {
        ImageFile {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0xAB; len],
        }
    }

    #[test]
    fn caps_batch_at_five_preserving_order() {
        let files: Vec<ImageFile> = (1..=7)
            .map(|i| image(&format!("photo{}.jpg", i), "image/jpeg", 16))
            .collect();

        let out = encode_images(files);

        assert_eq!(out.encoded.len(), MAX_IMAGES);
        assert_eq!(out.rejected.len(), 2);
        assert!(out
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::OverCap));
        // accepted payloads are identical here; order is asserted via
        // the rejected tail being exactly files 6 and 7
        assert_eq!(out.rejected[0].file_name, "photo6.jpg");
        assert_eq!(out.rejected[1].file_name, "photo7.jpg");
    }

    #[test]
    fn rejects_non_image_types_with_reason() {
        let out = encode_images(vec![
            image("notes.pdf", "application/pdf", 16),
            image("photo.png", "image/png", 16),
        ]);

        assert_eq!(out.encoded.len(), 1);
        assert_eq!(
            out.rejected,
            vec![ImageRejection {
                file_name: "notes.pdf".to_string(),
                reason: RejectReason::NotAnImage,
            }]
        );
    }

    #[test]
    fn rejects_oversized_files_with_size() {
        let out = encode_images(vec![image("huge.jpg", "image/jpeg", MAX_IMAGE_BYTES + 1)]);

        assert!(out.encoded.is_empty());
        assert_eq!(
            out.rejected[0].reason,
            RejectReason::TooLarge {
                size: MAX_IMAGE_BYTES + 1
            }
        );
    }

    #[test]
    fn invalid_files_do_not_consume_cap_slots() {
        let mut files = vec![image("bad.txt", "text/plain", 4)];
        files.extend((1..=5).map(|i| image(&format!("p{}.png", i), "image/png", 8)));

        let out = encode_images(files);

        assert_eq!(out.encoded.len(), MAX_IMAGES, "all five valid files fit");
        assert_eq!(out.rejected.len(), 1);
    }

    #[test]
    fn encodes_as_data_url() {
        let out = encode_images(vec![ImageFile {
            file_name: "dot.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }]);

        assert_eq!(out.encoded[0], "data:image/png;base64,AQID");
    }
}
