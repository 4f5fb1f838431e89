//! Ephemeral previews for attachments that are still uploading.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use taskchat_shared::constants::MAX_INLINE_PREVIEW_BYTES;
use taskchat_shared::LocalFile;
use taskchat_store::AttachmentPreview;

/// One preview per file, in order. Only images small enough to inline get a URL.
pub fn build_previews(files: &[LocalFile]) -> Vec<AttachmentPreview> {
    files
        .iter()
        .map(|file| AttachmentPreview {
            file_name: file.name.clone(),
            content_type: file.content_type.clone(),
            preview_url: inline_preview_url(file),
        })
        .collect()
}

fn inline_preview_url(file: &LocalFile) -> Option<String> {
    if !file.is_image() || file.size() > MAX_INLINE_PREVIEW_BYTES {
        return None;
    }
    Some(format!(
        "data:{};base64,{}",
        file.content_type.trim(),
        STANDARD.encode(&file.data)
    ))
}
