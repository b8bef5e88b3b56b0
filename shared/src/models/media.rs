//! Media library models

use serde::{Deserialize, Serialize};

/// Kind of media file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Document => "document",
        }
    }
}

/// Who can see a media item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaVisibility {
    Public,
    Parents,
    Staff,
}

impl MediaVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaVisibility::Public => "public",
            MediaVisibility::Parents => "parents",
            MediaVisibility::Staff => "staff",
        }
    }
}

/// Guess the media type from a file name or URL extension
pub fn media_type_for(path: &str) -> Option<MediaType> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" => Some(MediaType::Image),
        "mp4" | "mov" | "webm" | "m4v" => Some(MediaType::Video),
        "pdf" | "doc" | "docx" | "txt" => Some(MediaType::Document),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("recital/IMG_001.JPG"), Some(MediaType::Image));
        assert_eq!(media_type_for("https://cdn.example.com/v/finale.mp4?sig=abc"), Some(MediaType::Video));
        assert_eq!(media_type_for("handbook.pdf"), Some(MediaType::Document));
        assert_eq!(media_type_for("archive.zip"), None);
        assert_eq!(media_type_for("no-extension"), None);
    }
}
