//! Main library for bumpers, used by its CLI.
//!
//! Bumpers keeps an AI coding assistant on the rails: it matches the
//! assistant's tool calls against project rules and blocks or annotates them
//! with guidance.

pub mod claude;
pub mod config;
pub mod engine;
pub mod project;
pub mod rephrase;
pub mod rules;
pub mod storage;
pub mod template;
