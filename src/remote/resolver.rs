use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::{
    result::{Error, Result},
    types::SegmentManifest,
};

use super::{playlist, GqlClient, PlaybackGrant};

pub const USHER_VOD_ENDPOINT: &str = "https://usher.ttvnw.net/vod/";

/// Turns a content identifier into the list of its segments
#[derive(Debug)]
pub struct ManifestResolver<'a> {
    gql: &'a GqlClient,
    usher: String,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(gql: &'a GqlClient) -> Self {
        Self {
            gql,
            usher: USHER_VOD_ENDPOINT.to_owned(),
        }
    }

    pub fn with_usher(mut self, usher: impl Into<String>) -> Self {
        self.usher = usher.into();
        self
    }

    /// Resolve the source-quality segments of a video
    pub fn resolve_video(&self, id: &str) -> Result<SegmentManifest> {
        let grant = self
            .gql
            .video_grant(id)
            .map_err(|err| as_authorization(id, err))?
            .ok_or_else(|| Error::Authorization {
                id: id.to_owned(),
                reason: "no playback grant returned".to_owned(),
            })?;

        let master_url = self.master_playlist_url(id, &grant)?;
        debug!("Fetching master playlist of video {id}");
        let master = self.fetch_text(id, master_url.as_str())?;

        let rendition = playlist::first_rendition(&master)?;
        let rendition_url = master_url
            .join(&rendition)
            .map_err(|err| Error::ManifestParse(format!("invalid rendition URI '{rendition}': {err}")))?;

        debug!("Fetching media playlist {rendition_url}");
        let media = self.fetch_text(id, rendition_url.as_str())?;
        let manifest = manifest_from_media(rendition_url.as_str(), &media)?;

        info!("Video {id} has {} segments", manifest.len());
        Ok(manifest)
    }

    /// Resolve a clip into a manifest made of its single source-quality file
    pub fn resolve_clip(&self, slug: &str) -> Result<SegmentManifest> {
        let playback = self
            .gql
            .clip_playback(slug)
            .map_err(|err| as_authorization(slug, err))?
            .ok_or_else(|| Error::Authorization {
                id: slug.to_owned(),
                reason: "no playback grant returned".to_owned(),
            })?;

        let source = playback
            .sources
            .first()
            .ok_or_else(|| Error::ManifestParse(format!("clip '{slug}' has no quality")))?;

        let mut url = Url::parse(source)
            .map_err(|err| Error::ManifestParse(format!("invalid clip URI '{source}': {err}")))?;
        url.query_pairs_mut()
            .append_pair("sig", &playback.grant.signature)
            .append_pair("token", &playback.grant.value);

        let url = url.as_str();
        let base = playlist::base_uri(url);
        let file = url.strip_prefix(base.as_str()).unwrap_or(url);

        Ok(SegmentManifest::new(base, [file]))
    }

    fn master_playlist_url(&self, id: &str, grant: &PlaybackGrant) -> Result<Url> {
        let mut url = Url::parse(&self.usher)
            .and_then(|usher| usher.join(&format!("{id}.m3u8")))
            .map_err(|err| Error::ManifestParse(format!("invalid playlist endpoint: {err}")))?;

        url.query_pairs_mut()
            .append_pair("allow_source", "true")
            .append_pair("allow_audio_only", "true")
            .append_pair("player", "twitchweb")
            .append_pair("p", &fastrand::u32(100_000..1_000_000).to_string())
            .append_pair("sig", &grant.signature)
            .append_pair("token", &grant.value);

        Ok(url)
    }

    fn fetch_text(&self, id: &str, url: &str) -> Result<String> {
        let response = self.gql.http().get(url).send()?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Authorization {
                id: id.to_owned(),
                reason: format!("playlist refused with status {}", response.status()),
            }),
            _ => Ok(response.error_for_status()?.text()?),
        }
    }
}

/// A rejected grant query means the id is invalid or the grant expired
fn as_authorization(id: &str, err: Error) -> Error {
    match err {
        Error::QueryRejected { message, .. } => Error::Authorization {
            id: id.to_owned(),
            reason: message,
        },
        err => err,
    }
}

/// Build the manifest of a rendition from its media playlist
pub fn manifest_from_media(rendition_url: &str, media: &str) -> Result<SegmentManifest> {
    let segments = playlist::media_segments(media)?;
    Ok(SegmentManifest::new(playlist::base_uri(rendition_url), segments))
}
