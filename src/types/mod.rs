mod chat;
mod content;
mod manifest;

pub use chat::{ChatEvent, Speaker, SpeakerTable, Transcript, DEFAULT_COLOR, UNKNOWN_SPEAKER};
pub use content::{Channel, Chapter, ContentInfo, ContentItem, ContentKind};
pub use manifest::SegmentManifest;
