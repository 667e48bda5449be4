//! # TAZMIC Core
//!
//! Domain types, traits, and error definitions for the TAZMIC document
//! assistant. This crate has **no framework dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Seams
//!
//! Each external collaborator is a trait here, with implementations in the
//! crate that owns it:
//! - [`Provider`] — the language model (chat completions + embeddings)
//! - [`DocumentStore`] / [`Embedder`] — the indexed document
//! - [`Tool`] — functions the model may call, collected in a closed [`ToolRegistry`]

pub mod document;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use document::{DocumentChunk, DocumentStore, Embedder};
pub use error::{AgentError, Error, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageBody, PairingError, Role, Thread, ThreadId, ToolInvocation};
pub use provider::{ImageDescriptionRequest, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolOutcome, ToolRegistry};
