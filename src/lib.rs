//! Leadflow - Conversational lead capture
//!
//! This crate ingests inbound customer messages on behalf of tenant businesses,
//! enforces per-sender and per-target message quotas, keeps one open conversation
//! per customer, and later extracts structured lead information from finished
//! conversations with a language model.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
