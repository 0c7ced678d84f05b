//! Manifest records and the entries they describe.

pub mod entry;
pub mod path;
pub mod reader;
pub mod record;

pub use entry::{Attributes, EncryptedKind, EndMarker, EntryKind, ManifestEntry};
pub use path::EntryPath;
pub use reader::ManifestReader;
pub use record::Record;
