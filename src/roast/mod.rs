pub mod gemini;
pub mod generator;
pub mod tables;

pub use gemini::{offline_placeholder, simulated_response, GeminiClient, GeminiConfig, OFFLINE_PREFIX};
pub use generator::{format_duration, RoastGenerator, RoastPrompt, UserContext};
pub use tables::RoastTables;
