use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "XCINFO_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressChoice {
    /// Rich on a terminal, plain otherwise.
    #[default]
    Auto,
    Rich,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub concurrency:   u32,
    pub disable_sleep: bool,
    pub download_dir:  Option<PathBuf>,
    pub progress:      ProgressChoice,
    pub authorization: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency:   4,
            disable_sleep: true,
            download_dir:  None,
            progress:      ProgressChoice::Auto,
            authorization: None,
        }
    }
}

impl Config {
    /// Defaults, then `<user-config>/xcinfo/config.toml`, then `XCINFO_*`.
    pub fn load() -> Result<Self, figment::Error> {
        let file = xcinfo_platform::dir::app_config().map(|dir| dir.join(CONFIG_FILE));
        Self::figment(file.as_deref()).extract()
    }

    fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match file {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
