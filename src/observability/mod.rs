//! Observability utilities for the orchestrator.
//!
//! Diagnostic events go through `tracing`. This module adds a markdown
//! session log that records every turn in a human-readable file.
//!
//! # Example
//!
//! ```no_run
//! use atk::observability::Logger;
//!
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//!
//! logger.log_turn_start("conv-1", "list files").unwrap();
//! logger.log_llm_response("Here you go.", Some("claude-sonnet-4-0")).unwrap();
//! logger.log_turn_complete("conv-1", 1200).unwrap();
//! ```

pub mod logger;

pub use logger::Logger;
