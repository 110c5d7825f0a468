//! Model provider clients for promptloom.
//!
//! This crate provides concrete [`CompletionProvider`] implementations for
//! remote model vendors, credential lookup, and the factory the engine's
//! router uses to build a client per model spec.
//!
//! # Providers
//!
//! - **Anthropic Claude** — `ClaudeClient`
//! - **OpenAI** — `OpenAiClient`
//! - **Google Gemini** — `GeminiClient`
//! - **Simulated** — `SimulatedProvider`, a network-free echo used by
//!   preview runs and tests; its results are flagged `simulated`
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ClaudeClient, CompletionProvider, CompletionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClaudeClient::new(std::env::var("ANTHROPIC_API_KEY")?, "claude-3-5-sonnet-latest");
//!     let response = client.complete(CompletionRequest::new("What is Rust?")).await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod request;
pub mod simulated;

pub use config::ProviderConfig;
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use error::{LlmError, Result};
pub use provider::CompletionProvider;
pub use registry::{CredentialProviderFactory, ProviderFactory};
pub use remote::{ClaudeClient, GeminiClient, OpenAiClient};
pub use request::{CompletionRequest, CompletionResponse};
pub use simulated::SimulatedProvider;
