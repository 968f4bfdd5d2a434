//! Minimal M3U8 reading: only what is needed to pick a rendition and list
//! its segments.

use crate::result::{Error, Result};

fn check_header(contents: &str) -> Result<()> {
    if contents.trim_start().starts_with("#EXTM3U") {
        Ok(())
    } else {
        Err(Error::ManifestParse("missing #EXTM3U header".into()))
    }
}

/// URI of the first rendition of a master playlist.
///
/// Renditions are listed best first, so the first one is the source quality.
pub fn first_rendition(contents: &str) -> Result<String> {
    check_header(contents)?;

    let mut in_stream_inf = false;
    for line in contents.lines().map(str::trim) {
        if line.starts_with("#EXT-X-STREAM-INF") {
            in_stream_inf = true;
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        } else if in_stream_inf {
            return Ok(line.to_owned());
        }
    }

    Err(Error::ManifestParse("master playlist lists no rendition".into()))
}

/// Segment URIs of a media playlist, in playlist order, repeats included
pub fn media_segments(contents: &str) -> Result<Vec<String>> {
    check_header(contents)?;

    let mut segments = Vec::new();
    let mut pending_inf = false;
    for line in contents.lines().map(str::trim) {
        if let Some(duration) = line.strip_prefix("#EXTINF:") {
            let duration = duration.split(',').next().unwrap_or_default();
            duration
                .parse::<f64>()
                .map_err(|_| Error::ManifestParse(format!("invalid EXTINF duration '{duration}'")))?;
            pending_inf = true;
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        } else if pending_inf {
            segments.push(line.to_owned());
            pending_inf = false;
        } else {
            return Err(Error::ManifestParse(format!(
                "segment '{line}' has no #EXTINF"
            )));
        }
    }

    if segments.is_empty() {
        return Err(Error::ManifestParse("playlist has no segment".into()));
    }

    Ok(segments)
}

/// Everything up to and including the last `/` of the URI path
pub fn base_uri(uri: &str) -> String {
    let without_query = uri.split(['?', '#']).next().unwrap_or_default();
    match without_query.rfind('/') {
        Some(idx) => without_query[..=idx].to_owned(),
        None => String::new(),
    }
}
