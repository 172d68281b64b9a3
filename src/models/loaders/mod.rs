pub mod toml_loader;

pub use toml_loader::{load_all_blueprints, load_blueprint, parse_blueprint};
