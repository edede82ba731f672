//! Core pipeline orchestration for ClientIntel.
//!
//! This crate ties the record source, search client, insight extractor, and
//! record sink together into one sequential run over a client table.

pub mod pipeline;
