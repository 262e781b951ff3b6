pub mod loader;
pub mod schema;
pub mod templates;

pub use loader::{default_config_path, load_settings, load_settings_from_str};
pub use schema::{ApiKeys, BackendSettings, DescriptionSettings, RehostSettings, Settings};
pub use templates::{render, TemplateEngine, TemplateVars};
