mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{API_BASE_ENV, PROJECT_CONFIG_DIR_ENV};
