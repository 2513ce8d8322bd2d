//! # paperfinder
//!
//! An agent that answers research questions with BibTeX citations.
//!
//! A reasoning model drives a tool loop over scholarly sources (arXiv,
//! DBLP, Semantic Scholar, CrossRef, the web and downloaded PDFs). The
//! [`agent::Engine`] collects the candidates those tools return,
//! deduplicates and ranks them by publication venue, renders the best
//! five as BibTeX, and optionally asks the model for one more
//! verification round before answering.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paperfinder::agent::{AgentConfig, Engine, NullSessionLog};
//! use paperfinder::agent::client::create_provider;
//! use paperfinder::tools::standard_registry;
//!
//! # async fn demo() -> paperfinder::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let registry = Arc::new(standard_registry(&config)?);
//! let engine = Engine::new(provider, registry, config);
//!
//! let outcome = engine.run("the original transformer paper", &NullSessionLog::default()).await;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod citation;
pub mod cli;
pub mod core;
pub mod error;
pub mod tools;

pub use error::{Error, Result};
