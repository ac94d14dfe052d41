//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `speakers` - Cached speaker listing
//! - `speak` - Chunked synthesis with built-in or cloned voices
//! - `transcribe` - Speech-to-text with word timestamps
//! - `languages` - Transcription language table

pub mod api;
pub mod languages;
pub mod speak;
pub mod speakers;
pub mod transcribe;
