//! # Services Module
//!
//! External service integrations for the covenant tool.
//!
//! ## Components
//!
//! - **RPC Client**: Bitcoin Core RPC client for funding PSBTs and relaying transactions

pub mod rpc_client;

pub use rpc_client::NodeClient;
