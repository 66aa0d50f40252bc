pub mod leaf_decoder;
pub mod types;

pub use leaf_decoder::{decode_leaf, DecodedLeaf};
pub use types::{EntryType, GetEntriesResponse, LogEntry, SignedTreeHead};
