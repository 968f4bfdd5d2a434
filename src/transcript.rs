//! Compact on-disk format for chat transcripts.
//!
//! ```text
//! <color>;<name>␟<color>;<name>␟...
//! <offset>␟<state>␟<speaker index>␟<text>
//! <offset>␟<state>␟<speaker index>␟<text>
//! ```
//!
//! `␟` is the unit separator byte `0x1F`. The first line lists every speaker
//! once, in first-seen order, and event lines refer to them by zero-based
//! index. There is no newline after the last line.
//!
//! Backslash, CR, LF and `0x1F` inside fields are escaped as `\\`, `\r`,
//! `\n` and `\d`. Header fields also escape `;` as `\s`. Text without any of
//! those bytes is stored verbatim.

use std::{borrow::Cow, fs, path::Path};

use tracing::debug;

use crate::{
    io::atomic_write,
    result::{Error, Result},
    types::{ChatEvent, Speaker, SpeakerTable, Transcript},
};

/// Field and speaker separator
pub const DELIMITER: char = '\u{1f}';

/// Serialize a transcript
pub fn encode(transcript: &Transcript) -> String {
    let speakers = transcript.speakers();

    let mut out = String::new();
    for (idx, speaker) in speakers.iter().enumerate() {
        if idx > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape(&speaker.color, true));
        out.push(';');
        out.push_str(&escape(&speaker.name, true));
    }
    out.push('\n');

    for (line, event) in transcript.events().iter().enumerate() {
        if line > 0 {
            out.push('\n');
        }

        // A transcript only holds events whose speaker is in its table
        let speaker_idx = speakers.index_of(&event.speaker).unwrap_or_default();

        out.push_str(&event.offset_secs.to_string());
        out.push(DELIMITER);
        out.push_str(&event.state.to_string());
        out.push(DELIMITER);
        out.push_str(&speaker_idx.to_string());
        out.push(DELIMITER);
        out.push_str(&escape(&event.text, false));
    }

    out
}

/// Parse a transcript produced by [`encode`]
pub fn decode(data: &str) -> Result<Transcript> {
    let (header, body) = data.split_once('\n').ok_or_else(|| Error::TranscriptParse {
        line: 1,
        reason: "missing speaker header".to_owned(),
    })?;

    let speakers = parse_header(header)?;

    let events = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n')
            .enumerate()
            .map(|(idx, line)| parse_event(line, idx + 2, &speakers))
            .collect::<Result<Vec<_>>>()?
    };

    Ok(Transcript::from_parts(speakers, events))
}

/// Encode a transcript into a file, replacing it atomically
pub fn write(path: &Path, transcript: &Transcript) -> Result<()> {
    debug!(
        "Writing {} chat events ({} speakers) to '{}'",
        transcript.len(),
        transcript.speakers().len(),
        path.display()
    );
    atomic_write(path, encode(transcript).as_bytes())
}

pub fn read(path: &Path) -> Result<Transcript> {
    let data = fs::read_to_string(path)?;
    decode(&data)
}

impl Transcript {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write(path, self)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        read(path)
    }
}

fn parse_header(header: &str) -> Result<SpeakerTable> {
    let mut speakers = SpeakerTable::new();
    if header.is_empty() {
        return Ok(speakers);
    }

    for pair in header.split(DELIMITER) {
        let (color, name) = pair.split_once(';').ok_or_else(|| Error::TranscriptParse {
            line: 1,
            reason: format!("speaker entry '{pair}' has no ';'"),
        })?;

        let speaker = Speaker {
            name: unescape(name, 1)?,
            color: unescape(color, 1)?,
        };
        let len_before = speakers.len();
        if speakers.intern(&speaker) != len_before {
            return Err(Error::TranscriptParse {
                line: 1,
                reason: format!("speaker '{}' is listed twice", speaker.name),
            });
        }
    }

    Ok(speakers)
}

fn parse_event(line: &str, line_no: usize, speakers: &SpeakerTable) -> Result<ChatEvent> {
    let malformed = |reason: String| Error::TranscriptParse {
        line: line_no,
        reason,
    };

    let mut fields = line.splitn(4, DELIMITER);
    let mut next_field = |name: &str| {
        fields
            .next()
            .ok_or_else(|| malformed(format!("missing {name} field")))
    };

    let offset = next_field("offset")?;
    let state = next_field("state")?;
    let speaker_idx = next_field("speaker")?;
    let text = next_field("text")?;

    let offset_secs = offset
        .parse()
        .map_err(|_| malformed(format!("invalid offset '{offset}'")))?;
    let state = state
        .parse()
        .map_err(|_| malformed(format!("invalid state '{state}'")))?;
    let speaker = speaker_idx
        .parse::<usize>()
        .ok()
        .and_then(|idx| speakers.get(idx))
        .ok_or_else(|| malformed(format!("unknown speaker index '{speaker_idx}'")))?
        .clone();

    Ok(ChatEvent {
        speaker,
        offset_secs,
        state,
        text: unescape(text, line_no)?,
    })
}

fn escape(field: &str, in_header: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| {
        matches!(c, '\\' | '\n' | '\r' | DELIMITER) || (in_header && c == ';')
    };
    if !field.contains(needs_escape) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len() + 8);
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            DELIMITER => out.push_str("\\d"),
            ';' if in_header => out.push_str("\\s"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(field: &str, line: usize) -> Result<String> {
    if !field.contains('\\') {
        return Ok(field.to_owned());
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let unescaped = match chars.next() {
            Some('\\') => '\\',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('d') => DELIMITER,
            Some('s') => ';',
            other => {
                return Err(Error::TranscriptParse {
                    line,
                    reason: format!("invalid escape sequence '\\{}'", other.unwrap_or(' ')),
                })
            }
        };
        out.push(unescaped);
    }

    Ok(out)
}
