//! CLI subcommand implementations.

pub mod chat;
pub mod doctor;
pub mod index;
pub mod ingest;
pub mod init;
pub mod runtime;
pub mod serve;
