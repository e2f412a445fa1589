//! Retrieval: backend clients, snippet extraction, fusion and answers.

pub mod answers;
pub mod hybrid;
pub mod orchestrator;
pub mod snippets;
pub mod vector;
pub mod zoekt;
