//! # Map Agent
//!
//! Tool-calling LLM agent for a web GIS client.
//!
//! This library provides:
//! - An HTTP API that turns a user's message into map instructions
//! - A fixed catalog of map tools (layer visibility, attribute query,
//!   spatial analysis, save/export of results)
//! - Per-conversation history so "save that" resolves to the latest analysis
//! - An OpenAI-compatible client for the model provider
//!
//! ## Architecture
//!
//! Every request is one two-phase turn:
//! 1. Lock the conversation and build the system prompt from its history
//! 2. Call the LLM with every tool bound
//! 3. Execute each proposed tool call and record the results
//! 4. Call the LLM again with the results to phrase the final answer
//!
//! The tools never touch geometry: they return instructions that the
//! frontend map renderer executes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use map_agent::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod history;
pub mod llm;
pub mod tools;

pub use config::Config;
