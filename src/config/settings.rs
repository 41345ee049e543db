use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiSettings {
    /// Versioned API root, e.g. `https://api.example.com/api/v1`
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct CacheSettings {
    /// Where cached pages live (default: <config dir>/cache)
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DisplaySettings {
    pub currency_symbol: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
