use std::collections::HashMap;

/// Color given to speakers who never picked one
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Name given to messages whose author is gone (deleted or banned account)
pub const UNKNOWN_SPEAKER: &str = "[unknown]";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Speaker {
    pub name: String,
    pub color: String,
}

impl Speaker {
    /// Build a speaker, substituting the placeholders for missing parts
    pub fn new(name: Option<&str>, color: Option<&str>) -> Self {
        let name = name.filter(|name| !name.is_empty()).unwrap_or(UNKNOWN_SPEAKER);
        let color = color.filter(|color| !color.is_empty()).unwrap_or(DEFAULT_COLOR);

        Self {
            name: name.to_owned(),
            color: color.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub speaker: Speaker,
    /// Seconds since the start of the stream
    pub offset_secs: u64,
    /// Opaque per-message state code, 0 for a regular visible message
    pub state: u32,
    pub text: String,
}

/// Unique speakers of a transcript, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct SpeakerTable {
    speakers: Vec<Speaker>,
    positions: HashMap<Speaker, usize>,
}

impl SpeakerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of the speaker, adding it at the end if unseen
    pub fn intern(&mut self, speaker: &Speaker) -> usize {
        if let Some(&idx) = self.positions.get(speaker) {
            return idx;
        }
        let idx = self.speakers.len();
        self.speakers.push(speaker.clone());
        self.positions.insert(speaker.clone(), idx);
        idx
    }

    pub fn index_of(&self, speaker: &Speaker) -> Option<usize> {
        self.positions.get(speaker).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&Speaker> {
        self.speakers.get(idx)
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Speaker> {
        self.speakers.iter()
    }
}

// The positions are derived from the list
impl PartialEq for SpeakerTable {
    fn eq(&self, other: &Self) -> bool {
        self.speakers == other.speakers
    }
}

impl Eq for SpeakerTable {}

impl FromIterator<Speaker> for SpeakerTable {
    fn from_iter<T: IntoIterator<Item = Speaker>>(iter: T) -> Self {
        let mut table = SpeakerTable::new();
        for speaker in iter {
            table.intern(&speaker);
        }
        table
    }
}

/// Chat history of one piece of content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    speakers: SpeakerTable,
    events: Vec<ChatEvent>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a transcript whose speaker table was read separately.
    ///
    /// Every event speaker must be present in the table.
    pub(crate) fn from_parts(speakers: SpeakerTable, events: Vec<ChatEvent>) -> Self {
        debug_assert!(events.iter().all(|e| speakers.index_of(&e.speaker).is_some()));
        Self { speakers, events }
    }

    pub fn push(&mut self, event: ChatEvent) {
        self.speakers.intern(&event.speaker);
        self.events.push(event);
    }

    pub fn speakers(&self) -> &SpeakerTable {
        &self.speakers
    }

    pub fn events(&self) -> &[ChatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<ChatEvent> for Transcript {
    fn from_iter<T: IntoIterator<Item = ChatEvent>>(iter: T) -> Self {
        let mut transcript = Transcript::new();
        for event in iter {
            transcript.push(event);
        }
        transcript
    }
}
