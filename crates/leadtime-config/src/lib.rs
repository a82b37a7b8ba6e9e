// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Configuration for leadtime exporters
//!
//! Settings come from an optional TOML, YAML or JSON file, then environment
//! variables, then command-line flags. Validation runs once on the merged
//! result and any failure is fatal at startup.
//!
//! # Features
//!
//! - Multi-format configuration support (TOML, YAML, JSON)
//! - Environment overrides using the variable names of the upstream exporters,
//!   with aliases and the `default` keyword
//! - Provider settings as a tagged enum (`github`, `gitlab`, `bitbucket`,
//!   `gitea`, `azure-devops`, `image`)
//! - Token redaction in `Debug` output
//!
//! # Example
//!
//! ```no_run
//! use leadtime_config::{ConfigLoader, SystemEnv};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_env(Some("leadtime.toml"), &SystemEnv).await?;
//!
//!     println!("Exporting {} events via {}", config.exporter.kind, config.provider.name());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{split_list, ConfigFormat, ConfigLoader, EnvSource, SystemEnv};
pub use schema::*;
pub use validation::Validator;
