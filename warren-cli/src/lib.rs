//! # warren-cli
//!
//! Command-line client for AMQP brokers, built on `warren-core`.
//!
//! ## Commands
//!
//! - **declare-queue**: declare a named or server-named queue.
//! - **publish**: send one message, reporting it if the broker returns it.
//! - **get**: fetch a single message.
//! - **consume**: subscribe and print messages until a limit or timeout.

pub mod commands;
pub mod config;
