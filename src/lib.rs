//! English ↔ Vietnamese translation.
//!
//! Long text is split on natural boundaries, each chunk is translated with
//! bounded retries, and the results are joined back in order. On top of the
//! engine sit an HTTP server, a remote client and a page controller that
//! translates an HTML document incrementally as it changes.

pub mod caller;
pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod controller;
pub mod dom;
pub mod engine;
pub mod error;
pub mod provider;
pub mod reassemble;
pub mod request;
pub mod retry;
pub mod segment;
pub mod server;
pub mod settings;

pub use engine::{BatchTranslator, TranslationEngine};
pub use error::{ProviderError, TranslateError};
pub use request::{JoinPolicy, TranslationRequest};
