use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering TOML and environment
    /// variables over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration from a specific TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = ConfigLoader::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.broker.mode, "paper");
        assert_eq!(config.processes.level_monitor_interval_secs, 5);
        assert_eq!(config.database.max_connections, 10);
    }
}
