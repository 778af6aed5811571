//! Optional config file loading. Search order: ./hbcrawl.toml, then
//! $XDG_CONFIG_HOME/hbcrawl/config.toml (or ~/.config/hbcrawl/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Base delay in milliseconds between requests.
    pub gap_ms: Option<u64>,
    /// Delay accuracy in [0, 1]; 1 is a fixed delay, 0 spreads it up to twice the gap.
    pub accuracy: Option<f64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// How boards are fetched: json (default) or html.
    pub board_source: Option<String>,
    /// Also write each pin's record as {pin_id}.json.
    pub save_meta: Option<bool>,
    /// Skip images already on disk.
    pub ignore_saved: Option<bool>,
    /// Site root, e.g. http://huaban.com. Mostly useful for mirrors and tests.
    pub site_root: Option<String>,
}

/// Search order: (1) ./hbcrawl.toml, (2) $XDG_CONFIG_HOME/hbcrawl/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("hbcrawl.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("hbcrawl").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            log::debug!("loaded config from {}", path.display());
            return Ok(Some(config));
        }
    }
    Ok(None)
}
