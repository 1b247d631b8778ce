// Metadata extraction

pub mod extractor;

pub use extractor::{display_title, MetadataExtractor};
