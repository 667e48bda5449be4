//! LLM Provider implementations for TAZMIC.
//!
//! All providers implement the `tazmic_core::Provider` trait.
//! [`build_from_config`] selects and constructs one from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
