use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

/// Which kind of content an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Video,
    Clip,
}

impl ContentKind {
    /// Name of the per-channel directory holding this kind of content
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Video => "videos",
            ContentKind::Clip => "clips",
        }
    }
}

/// Fields shared by every kind of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: String,
    pub channel_id: String,
    pub channel_login: String,
    pub channel_display_name: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub duration_secs: u64,
    #[serde(default)]
    pub has_transcript: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub offset_secs: u64,
    pub duration_secs: u64,
    pub kind: String,
    pub label: String,
}

/// A piece of archived content, as persisted in its metadata record.
///
/// The record is written once. Only [`ContentInfo::has_transcript`] may be
/// updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Video {
        #[serde(flatten)]
        info: ContentInfo,
        chapters: Vec<Chapter>,
    },
    Clip {
        #[serde(flatten)]
        info: ContentInfo,
        slug: String,
        video_id: Option<String>,
        video_offset_secs: Option<u64>,
    },
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Video { .. } => ContentKind::Video,
            ContentItem::Clip { .. } => ContentKind::Clip,
        }
    }

    pub fn info(&self) -> &ContentInfo {
        match self {
            ContentItem::Video { info, .. } | ContentItem::Clip { info, .. } => info,
        }
    }

    pub fn info_mut(&mut self) -> &mut ContentInfo {
        match self {
            ContentItem::Video { info, .. } | ContentItem::Clip { info, .. } => info,
        }
    }

    pub fn id(&self) -> &str {
        &self.info().id
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            ContentItem::Clip { slug, .. } => Some(slug),
            ContentItem::Video { .. } => None,
        }
    }

    /// File stem shared by every artifact of this item: `YYYYMMDD-<id>`
    pub fn file_stem(&self) -> String {
        let info = self.info();
        let date = info
            .created_at
            .format(format_description!("[year][month][day]"))
            .unwrap_or_else(|_| "00000000".to_owned());

        format!("{date}-{}", info.id)
    }
}

/// A channel owning content. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn video() -> ContentItem {
        ContentItem::Video {
            info: ContentInfo {
                id: "1234".to_owned(),
                channel_id: "42".to_owned(),
                channel_login: "someone".to_owned(),
                channel_display_name: "Someone".to_owned(),
                title: "Late stream".to_owned(),
                created_at: datetime!(2023-04-05 22:10:00 UTC),
                duration_secs: 3600,
                has_transcript: false,
            },
            chapters: vec![Chapter {
                offset_secs: 0,
                duration_secs: 3600,
                kind: "GAME_CHANGE".to_owned(),
                label: "Just Chatting".to_owned(),
            }],
        }
    }

    #[test]
    fn metadata_is_tagged_by_kind() {
        let json = serde_json::to_value(video()).unwrap();
        assert_eq!(json["kind"], "video");
        assert_eq!(json["id"], "1234");
        assert_eq!(json["created_at"], "2023-04-05T22:10:00Z");
        assert_eq!(json["chapters"][0]["label"], "Just Chatting");
    }

    #[test]
    fn metadata_reads_back() {
        let item = video();
        let text = serde_json::to_string_pretty(&item).unwrap();
        let back: ContentItem = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.kind(), ContentKind::Video);
    }

    #[test]
    fn file_stem_starts_with_creation_date() {
        assert_eq!(video().file_stem(), "20230405-1234");
    }
}
