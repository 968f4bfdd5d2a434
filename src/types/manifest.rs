use std::collections::HashSet;

/// Ordered list of the segments making up one stream.
///
/// The order of [`SegmentManifest::segments`] is the reassembly order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentManifest {
    base_uri: String,
    segments: Vec<String>,
}

impl SegmentManifest {
    /// Build a manifest, dropping repeated segments but keeping the first
    /// occurrence of each at its place.
    pub fn new<I, S>(base_uri: impl Into<String>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let segments = segments
            .into_iter()
            .map(Into::into)
            .filter(|segment| seen.insert(segment.clone()))
            .collect();

        Self {
            base_uri: base_uri.into(),
            segments,
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Absolute URL of a segment
    pub fn url_of(&self, segment: &str) -> String {
        if segment.starts_with("http://") || segment.starts_with("https://") {
            segment.to_owned()
        } else {
            format!("{}{segment}", self.base_uri)
        }
    }

    /// File name under which the segment at `index` is stored locally.
    ///
    /// The manifest index comes first so that two segments never share a
    /// file, whatever their URIs look like once made file safe. Query strings
    /// are dropped and anything that is not safe in a file name is replaced,
    /// so segment 3 `chunked/12-muted.ts?x=1` becomes `00003-chunked_12-muted.ts`.
    pub fn local_name(index: usize, segment: &str) -> String {
        format!("{index:05}-{}", Self::file_safe(segment))
    }

    fn file_safe(segment: &str) -> String {
        let path = segment
            .split_once("://")
            .map_or(segment, |(_, rest)| rest.split_once('/').map_or(rest, |(_, p)| p));
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let name: String = path
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if name.trim_matches('.').is_empty() {
            "segment".to_owned()
        } else {
            name
        }
    }
}
