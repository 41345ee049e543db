mod settings;

pub use settings::{ApiSettings, CacheSettings, Config, DisplaySettings};

use crate::error::{PayoutError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.token`
pub const TOKEN_ENV: &str = "PAYOUTS_API_TOKEN";

/// Where `config.toml` and the default cache live: the platform config dir
/// for `payouts`, or `~/.payouts` when the platform has none.
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "payouts")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| home_dir().map(|home| home.join(".payouts")))
        .ok_or_else(|| {
            PayoutError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory for payouts and $HOME is unset",
            ))
        })
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Resolve a leading `~` in a configured cache path
pub fn expand_path(path: &str) -> PathBuf {
    let rest = match path {
        "~" => "",
        _ => match path.strip_prefix("~/") {
            Some(rest) => rest,
            None => return PathBuf::from(path),
        },
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Load the main config.toml, applying the token override from the environment
pub fn load_config(config_dir: &Path) -> Result<Config> {
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(PayoutError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    let mut config: Config =
        toml::from_str(&content).map_err(|e| PayoutError::ConfigParse { path, source: e })?;

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            config.api.token = Some(token);
        }
    }

    Ok(config)
}

/// Resolve the cache directory; relative paths are taken from the config dir
pub fn resolve_cache_dir(settings: &CacheSettings, config_dir: &Path) -> PathBuf {
    match settings.dir.as_deref() {
        Some(dir) => {
            let path = expand_path(dir);
            if path.is_absolute() {
                path
            } else {
                config_dir.join(path)
            }
        }
        None => config_dir.join("cache"),
    }
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[api]
base_url = "https://api.example.com/api/v1"
# token = "your-api-token"     # optional, or set PAYOUTS_API_TOKEN
timeout_secs = 30

[cache]
# dir = "~/.payouts/cache"     # optional, defaults to <config dir>/cache

[display]
currency_symbol = "$"
"#;
