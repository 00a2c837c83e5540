//! # Scaffold Core
//!
//! Domain types, traits, and error definitions for the Scaffold tutoring
//! pipeline. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates:
//! - [`Provider`]: the external classification / generation capability
//! - [`ConversationLog`]: the append-mostly conversation log store
//!
//! The pedagogical vocabulary ([`ScaffoldingType`], [`UnderstandingLevel`],
//! [`Trend`]) is a set of closed enumerations. Loose strings coming back from
//! a model are only trusted inside their `recognize` / `normalize` functions.

pub mod error;
pub mod level;
pub mod log;
pub mod message;
pub mod provider;
pub mod record;
pub mod scaffolding;
pub mod taxonomy;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use level::{Trend, UnderstandingLevel};
pub use log::ConversationLog;
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, generate};
pub use record::{ChatOutcome, ClassificationResult, ConversationRecord};
pub use scaffolding::ScaffoldingType;
pub use taxonomy::{GENERAL_CONCEPT, LearningUnit, Taxonomy, UnitMatch};
