//! METALBONES: a user-mode debugger engine and x86 (IA-32) instruction
//! decoder for 32-bit Windows processes.
//!
//! `decoder` is the standalone instruction decoder (C1-C6); `engine` is the
//! debugger engine built on top of it (C7-C11). A library consumer embeds
//! `engine::Debugger` directly; `main.rs` is a demonstration CLI.

pub mod config;
pub mod decoder;
pub mod engine;
pub mod log;
