// src/ingest/providers/mod.rs
pub mod alterna_site;
