pub mod chunker;

pub use chunker::{ChunkingError, ChunkingSpec, TextChunk, chunk, split_sentences};
