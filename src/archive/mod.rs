mod index;
mod layout;

pub use index::{ArchiveIndex, ChannelIndex, IndexEntry, IndexSnapshot};
pub use layout::{id_from_filename, ArchiveLayout, CHAT_EXT, INDEX_FILE, MEDIA_EXT, METADATA_EXT};
