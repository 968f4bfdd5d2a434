use indoc::indoc;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    result::{Error, Result},
    types::{Channel, Chapter, ChatEvent, ContentInfo, ContentItem, Speaker},
};

use super::GqlClient;

const VIDEO_QUERY: &str = indoc! {r#"
    query Video($id: ID!) {
        video(id: $id) {
            id
            title
            createdAt
            lengthSeconds
            owner { id login displayName }
            moments(momentRequestType: VIDEO_CHAPTER_MARKERS) {
                edges {
                    node { positionMilliseconds durationMilliseconds type description }
                }
            }
        }
    }
"#};

const CLIP_QUERY: &str = indoc! {r#"
    query Clip($slug: ID!) {
        clip(slug: $slug) {
            id
            slug
            title
            createdAt
            durationSeconds
            videoOffsetSeconds
            video { id }
            broadcaster { id login displayName }
        }
    }
"#};

const CHANNEL_QUERY: &str = indoc! {r#"
    query Channel($login: String!) {
        user(login: $login) { id login displayName createdAt }
    }
"#};

const VIDEO_GRANT_QUERY: &str = indoc! {r#"
    query VideoGrant($id: ID!) {
        videoPlaybackAccessToken(
            id: $id,
            params: { platform: "web", playerBackend: "mediaplayer", playerType: "site" }
        ) { signature value }
    }
"#};

const CLIP_PLAYBACK_QUERY: &str = indoc! {r#"
    query ClipPlayback($slug: ID!) {
        clip(slug: $slug) {
            playbackAccessToken(
                params: { platform: "web", playerBackend: "mediaplayer", playerType: "site" }
            ) { signature value }
            videoQualities { quality sourceURL }
        }
    }
"#};

const COMMENTS_QUERY: &str = indoc! {r#"
    query Comments($id: ID!, $cursor: Cursor) {
        video(id: $id) {
            comments(after: $cursor) {
                edges {
                    cursor
                    node {
                        contentOffsetSeconds
                        commenter { displayName }
                        message { userColor fragments { text } }
                    }
                }
                pageInfo { hasNextPage }
            }
        }
    }
"#};

/// Short-lived authorization to fetch a playlist or a clip file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackGrant {
    pub signature: String,
    pub value: String,
}

/// Where the file of a clip lives, best quality first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPlayback {
    pub grant: PlaybackGrant,
    pub sources: Vec<String>,
}

/// One page of chat events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPage {
    pub events: Vec<ChatEvent>,
    /// Cursor of the next page, if there is one
    pub next_cursor: Option<String>,
}

/// Paginated chat source
pub trait CommentSource {
    fn comments(&self, video_id: &str, cursor: Option<&str>) -> Result<CommentPage>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Owner {
    id: String,
    login: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Edges<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    #[serde(default)]
    cursor: Option<String>,
    node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Moment {
    position_milliseconds: u64,
    duration_milliseconds: u64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoNode {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    length_seconds: u64,
    owner: Owner,
    #[serde(default)]
    moments: Option<Edges<Moment>>,
}

#[derive(Debug, Deserialize)]
struct VideoData {
    video: Option<VideoNode>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipNode {
    id: String,
    slug: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    duration_seconds: u64,
    #[serde(default)]
    video_offset_seconds: Option<u64>,
    #[serde(default)]
    video: Option<VideoRef>,
    broadcaster: Owner,
}

#[derive(Debug, Deserialize)]
struct ClipData {
    clip: Option<ClipNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    id: String,
    login: String,
    display_name: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoGrantData {
    video_playback_access_token: Option<PlaybackGrant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quality {
    #[serde(rename = "sourceURL")]
    source_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipPlaybackNode {
    playback_access_token: Option<PlaybackGrant>,
    #[serde(default)]
    video_qualities: Vec<Quality>,
}

#[derive(Debug, Deserialize)]
struct ClipPlaybackData {
    clip: Option<ClipPlaybackNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Commenter {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Fragment {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    #[serde(default)]
    user_color: Option<String>,
    #[serde(default)]
    fragments: Vec<Fragment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    content_offset_seconds: u64,
    #[serde(default)]
    commenter: Option<Commenter>,
    message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Comments {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<CommentNode>>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct CommentsVideo {
    comments: Option<Comments>,
}

#[derive(Debug, Deserialize)]
struct CommentsData {
    video: Option<CommentsVideo>,
}

impl GqlClient {
    /// Metadata of a video, `None` if it does not exist
    pub fn video(&self, id: &str) -> Result<Option<ContentItem>> {
        let data: VideoData = self.query(VIDEO_QUERY, json!({ "id": id }))?;
        Ok(data.video.map(VideoNode::into_item))
    }

    /// Metadata of a clip, `None` if it does not exist
    pub fn clip(&self, slug: &str) -> Result<Option<ContentItem>> {
        let data: ClipData = self.query(CLIP_QUERY, json!({ "slug": slug }))?;
        Ok(data.clip.map(ClipNode::into_item))
    }

    pub fn channel(&self, login: &str) -> Result<Option<Channel>> {
        let data: UserData = self.query(CHANNEL_QUERY, json!({ "login": login }))?;
        Ok(data.user.map(UserNode::into_channel))
    }

    pub fn video_grant(&self, id: &str) -> Result<Option<PlaybackGrant>> {
        let data: VideoGrantData = self.query(VIDEO_GRANT_QUERY, json!({ "id": id }))?;
        Ok(data.video_playback_access_token)
    }

    pub fn clip_playback(&self, slug: &str) -> Result<Option<ClipPlayback>> {
        let data: ClipPlaybackData = self.query(CLIP_PLAYBACK_QUERY, json!({ "slug": slug }))?;

        Ok(data.clip.and_then(|clip| {
            let grant = clip.playback_access_token?;
            Some(ClipPlayback {
                grant,
                sources: clip
                    .video_qualities
                    .into_iter()
                    .map(|q| q.source_url)
                    .collect(),
            })
        }))
    }
}

impl CommentSource for GqlClient {
    fn comments(&self, video_id: &str, cursor: Option<&str>) -> Result<CommentPage> {
        let data: CommentsData = self.query(
            COMMENTS_QUERY,
            json!({ "id": video_id, "cursor": cursor }),
        )?;

        let Some(comments) = data.video.and_then(|video| video.comments) else {
            return Ok(CommentPage::default());
        };

        comments.into_page(video_id)
    }
}

impl UserNode {
    fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            login: self.login,
            display_name: self.display_name,
            created_at: self.created_at,
        }
    }
}

impl VideoNode {
    fn into_item(self) -> ContentItem {
        let chapters = self
            .moments
            .map(|moments| moments.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|edge| Chapter {
                offset_secs: edge.node.position_milliseconds / 1000,
                duration_secs: edge.node.duration_milliseconds / 1000,
                kind: edge.node.kind,
                label: edge.node.description.unwrap_or_default(),
            })
            .collect();

        ContentItem::Video {
            info: ContentInfo {
                id: self.id,
                channel_id: self.owner.id,
                channel_login: self.owner.login,
                channel_display_name: self.owner.display_name,
                title: self.title.unwrap_or_default(),
                created_at: self.created_at,
                duration_secs: self.length_seconds,
                has_transcript: false,
            },
            chapters,
        }
    }
}

impl ClipNode {
    fn into_item(self) -> ContentItem {
        ContentItem::Clip {
            info: ContentInfo {
                id: self.id,
                channel_id: self.broadcaster.id,
                channel_login: self.broadcaster.login,
                channel_display_name: self.broadcaster.display_name,
                title: self.title.unwrap_or_default(),
                created_at: self.created_at,
                duration_secs: self.duration_seconds,
                has_transcript: false,
            },
            slug: self.slug,
            video_id: self.video.map(|video| video.id),
            video_offset_secs: self.video_offset_seconds,
        }
    }
}

impl Comments {
    /// The page, failing if more pages are announced without a way to reach them
    fn into_page(self, video_id: &str) -> Result<CommentPage> {
        let next_cursor = if self.page_info.has_next_page {
            let cursor = self.edges.last().and_then(|edge| edge.cursor.clone());
            if cursor.is_none() {
                return Err(Error::TranscriptIncomplete {
                    id: video_id.to_owned(),
                    reason: "more pages announced without a cursor".to_owned(),
                });
            }
            cursor
        } else {
            None
        };

        let events = self
            .edges
            .into_iter()
            .map(|edge| {
                let node = edge.node;
                let name = node.commenter.and_then(|c| c.display_name);
                let text = node
                    .message
                    .fragments
                    .into_iter()
                    .map(|fragment| fragment.text)
                    .collect();

                ChatEvent {
                    speaker: Speaker::new(name.as_deref(), node.message.user_color.as_deref()),
                    offset_secs: node.content_offset_seconds,
                    state: 0,
                    text,
                }
            })
            .collect();

        Ok(CommentPage {
            events,
            next_cursor,
        })
    }
}
