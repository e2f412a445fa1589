//! Embedding and completion service clients.

pub mod answer;
pub mod completion;
pub mod embeddings;
