//! The DentAssist agent.
//!
//! - [`dispatcher`]: the conversational dispatcher. A query goes to the model
//!   together with the dental tool set and the `MessageOutput` schema; the
//!   model may call tools any number of times (up to a limit) before giving
//!   its final answer. Failures and empty answers become the app overview.
//! - [`vision`]: single-shot analysis of uploaded dental photos.

pub mod dispatcher;
pub mod vision;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::{AgentError, DentalAgent, Dispatch, INSTRUCTIONS, MessageOutput};
pub use vision::{ImageAnalyzer, VISION_PROMPT};
