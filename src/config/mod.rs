pub mod env;
mod loader;

pub use env::{AppConfig, ModelConfig, ValidationMode};
pub use loader::load_config;
