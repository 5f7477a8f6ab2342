use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

use super::error::Result;

lazy_static! {
    static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    /// Megabytes before `sidclean.log` is rotated at startup.
    pub max_size: u64,
    pub max_backups: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediateConfig {
    pub clean_acl: bool,
    pub replace_owner: bool,
    /// Account name (`DOMAIN\user`, `user`) or SID string (`S-1-5-...`).
    pub replacement_principal: String,
    pub workers: usize,
    pub queue_capacity: usize,
    /// SID string prefixes that are never treated as orphaned.
    pub preserve_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// 0 walks the whole tree.
    pub max_depth: usize,
    pub follow_links: bool,
    pub skip_denied_subtrees: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub enabled: bool,
    pub directory: String,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Report file prefix for purge runs; directory comes from `[report]`.
    pub file_prefix: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub remediate: RemediateConfig,
    pub traversal: TraversalConfig,
    pub report: ReportConfig,
    pub purge: PurgeConfig,
}

fn environment() -> Environment {
    Environment::with_prefix("SIDCLEAN")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("remediate.preserve_prefixes")
        .with_list_parse_key("purge.patterns")
        .try_parsing(true)
}

impl AppConfig {
    /// Resets the builder to the embedded defaults plus `SIDCLEAN_*` environment overrides.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        if let Some(config_contents) = default_config {
            builder = builder.add_source(File::from_str(config_contents, FileFormat::Toml));
        }

        builder = builder.add_source(environment());

        let mut w = BUILDER.write()?;
        *w = builder;

        Ok(())
    }

    /// Layers a user supplied TOML file over whatever is already configured.
    pub fn merge_config(config_file: Option<&Path>) -> Result<()> {
        if let Some(config_file_path) = config_file {
            let mut w = BUILDER.write()?;
            // Environment variables stay on top of the user file.
            *w = w
                .clone()
                .add_source(File::from(config_file_path).format(FileFormat::Toml))
                .add_source(environment());
        }
        Ok(())
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        let mut w = BUILDER.write()?;
        *w = w.clone().set_override(key, value)?;
        Ok(())
    }

    pub fn get<'de, T>(key: &'de str) -> Result<T>
    where
        T: serde::Deserialize<'de>,
    {
        let r = BUILDER.read()?;
        Ok(r.build_cloned()?.get::<T>(key)?)
    }

    pub fn fetch() -> Result<AppConfig> {
        let r = BUILDER.read()?;
        let config_clone = r.build_cloned()?;
        let app_config: AppConfig = config_clone.try_deserialize()?;
        Ok(app_config)
    }
}
