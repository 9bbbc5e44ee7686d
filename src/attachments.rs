use std::fmt::Display;

use crate::error::{Result, UploadError};
use crate::source::FileSource;

/// What a post can carry: up to four images, or one animated GIF, or one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    AnimatedGif,
    Video,
}

impl AttachmentKind {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or_default().trim();
        let essence = essence.to_ascii_lowercase();
        if essence == "image/gif" {
            Some(AttachmentKind::AnimatedGif)
        } else if essence.starts_with("image/") {
            Some(AttachmentKind::Image)
        } else if essence.starts_with("video/") {
            Some(AttachmentKind::Video)
        } else {
            None
        }
    }

    pub fn max_per_post(self) -> usize {
        match self {
            AttachmentKind::Image => 4,
            AttachmentKind::AnimatedGif | AttachmentKind::Video => 1,
        }
    }
}

impl Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::AnimatedGif => write!(f, "animated GIF"),
            AttachmentKind::Video => write!(f, "video"),
        }
    }
}

/// Checks that `sources` can be attached to a single post.
///
/// Returns the common kind, or `None` for an empty set.
pub fn check_attachment_set(sources: &[FileSource]) -> Result<Option<AttachmentKind>> {
    let mut kind = None;

    for source in sources {
        let this = source
            .mime_type()
            .and_then(AttachmentKind::from_mime_type)
            .ok_or_else(|| {
                UploadError::IncompatibleAttachmentSet(format!(
                    "'{}' has unsupported media type {}",
                    source.display_name(),
                    source.mime_type().unwrap_or("(unknown)")
                ))
            })?;

        match kind {
            None => kind = Some(this),
            Some(existing) if existing != this => {
                return Err(UploadError::IncompatibleAttachmentSet(format!(
                    "cannot mix {} and {} attachments",
                    existing, this
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(kind) = kind
        && sources.len() > kind.max_per_post()
    {
        return Err(UploadError::IncompatibleAttachmentSet(format!(
            "you can only attach up to {} file(s) of type {}, got {}",
            kind.max_per_post(),
            kind,
            sources.len()
        )));
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(names: &[&str]) -> Vec<FileSource> {
        names
            .iter()
            .map(|name| FileSource::from_bytes(*name, vec![0u8; 4]))
            .collect()
    }

    #[test]
    fn test_kind_from_mime_type() {
        assert_eq!(
            AttachmentKind::from_mime_type("image/png"),
            Some(AttachmentKind::Image)
        );
        assert_eq!(
            AttachmentKind::from_mime_type("IMAGE/GIF"),
            Some(AttachmentKind::AnimatedGif)
        );
        assert_eq!(
            AttachmentKind::from_mime_type("video/mp4; codecs=avc1"),
            Some(AttachmentKind::Video)
        );
        assert_eq!(AttachmentKind::from_mime_type("application/pdf"), None);
    }

    #[test]
    fn test_four_images_allowed() {
        let set = sources(&["a.png", "b.jpg", "c.webp", "d.png"]);
        assert_eq!(check_attachment_set(&set).unwrap(), Some(AttachmentKind::Image));
    }

    #[test]
    fn test_five_images_rejected() {
        let set = sources(&["a.png", "b.png", "c.png", "d.png", "e.png"]);
        let err = check_attachment_set(&set).unwrap_err();
        assert!(matches!(err, UploadError::IncompatibleAttachmentSet(_)));
    }

    #[test]
    fn test_single_video_or_gif_only() {
        assert!(check_attachment_set(&sources(&["a.mp4"])).is_ok());
        assert!(check_attachment_set(&sources(&["a.gif"])).is_ok());
        assert!(check_attachment_set(&sources(&["a.mp4", "b.mp4"])).is_err());
        assert!(check_attachment_set(&sources(&["a.gif", "b.gif"])).is_err());
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let err = check_attachment_set(&sources(&["a.png", "b.gif"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Incompatible attachment set: cannot mix image and animated GIF attachments"
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(check_attachment_set(&sources(&["notes.txt"])).is_err());
        assert!(check_attachment_set(&sources(&["no-extension"])).is_err());
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(check_attachment_set(&[]).unwrap(), None);
    }
}
