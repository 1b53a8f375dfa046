//! BanSo Chat - Conversational AI chat backend
//!
//! Forwards user messages to an LLM provider, keeps short-lived multi-turn
//! session context in memory, and streams replies back incrementally with
//! typing-simulation pacing. Degrades to canned persona responses when no
//! provider credential is available or the provider reports quota
//! exhaustion.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
