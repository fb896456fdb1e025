// src/moderation/media_policy.rs - Media-only channels and gif/video checks

use std::path::Path;

use crate::types::{Embed, MessageRef};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "heic"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi", "m4v"];

const MEDIA_EMBED_TYPES: &[&str] = &["image", "video", "gifv"];
const ANIMATED_EMBED_TYPES: &[&str] = &["video", "gifv"];

/// Hosts whose links render as gifs
const GIF_HOSTS: &[&str] = &["tenor.com", "giphy.com"];

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn has_extension(filename: &str, allowed: &[&str]) -> bool {
    extension(filename).map_or(false, |ext| allowed.contains(&ext.as_str()))
}

/// Media URLs often carry query strings, so look for `.ext` anywhere
fn url_looks_like_media(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS)
        .any(|ext| url.contains(&format!(".{}", ext)))
        || GIF_HOSTS.iter().any(|host| url.contains(host))
}

fn embed_is_media(embed: &Embed) -> bool {
    MEDIA_EMBED_TYPES.contains(&embed.kind.as_str())
        || embed.thumbnail_url.as_deref().map_or(false, url_looks_like_media)
        || embed.image_url.as_deref().map_or(false, url_looks_like_media)
}

/// Does the message carry an image, video or gif
pub fn has_allowed_media(message: &MessageRef) -> bool {
    message.attachments.iter().any(|attachment| {
        has_extension(&attachment.filename, IMAGE_EXTENSIONS)
            || has_extension(&attachment.filename, VIDEO_EXTENSIONS)
    }) || message.embeds.iter().any(embed_is_media)
}

/// A text-less post without media in a media-only channel
pub fn violates_media_restriction(message: &MessageRef, restricted: bool) -> bool {
    restricted && message.content.trim().is_empty() && !has_allowed_media(message)
}

/// Gifs and videos, whether attached, embedded or linked
pub fn is_animated_media(message: &MessageRef) -> bool {
    let attached = message.attachments.iter().any(|attachment| {
        has_extension(&attachment.filename, &["gif"])
            || has_extension(&attachment.filename, VIDEO_EXTENSIONS)
    });
    let embedded = message
        .embeds
        .iter()
        .any(|embed| ANIMATED_EMBED_TYPES.contains(&embed.kind.as_str()));
    let content = message.content.to_ascii_lowercase();
    let linked = GIF_HOSTS.iter().any(|host| content.contains(host));

    attached || embedded || linked
}
