mod api;
mod chat;
mod gql;
pub mod playlist;
mod resolver;

pub use api::{ClipPlayback, CommentPage, CommentSource, PlaybackGrant};
pub use chat::TranscriptCapturer;
pub use gql::{GqlClient, DEFAULT_CLIENT_ID, GQL_ENDPOINT};
pub use resolver::{manifest_from_media, ManifestResolver, USHER_VOD_ENDPOINT};
