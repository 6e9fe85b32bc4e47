//! Wire format types for each vendor API
//!
//! Request types only serialize and response types only deserialize;
//! conversion lives in [`crate::convert`].

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;
