//! Public exports for building LLM-ready generation prompts.

pub mod builder;
pub mod injector;
pub mod schema;
pub mod templates;

pub use builder::{render_prior_selections, PromptBuilder};
pub use schema::{PromptPayload, Section};
