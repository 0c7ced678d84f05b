//! On-disk backup storage: generations, datapaths and codecs.

pub mod compression;
pub mod datapath;
pub mod generation;

pub use compression::Compression;
pub use datapath::Datapath;
pub use generation::{BackupGeneration, GenerationChain};
