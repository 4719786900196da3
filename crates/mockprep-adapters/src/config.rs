//! Configuration management for mockprep
//!
//! Stores settings in ~/.config/mockprep/config.json

use crate::keyring;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_QUESTION_COUNT: u32 = 5;

const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_RETRIES_CAP: u32 = 10;
const MAX_QUESTION_COUNT: u32 = 20;

const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub default_question_count: u32,
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            default_question_count: DEFAULT_QUESTION_COUNT,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Pull hand-edited values back into a usable range.
    fn sanitize(&mut self) {
        let defaults = Self::default();

        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            self.model = defaults.model;
        }
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS);
        self.max_retries = self.max_retries.min(MAX_RETRIES_CAP);
        self.default_question_count = self.default_question_count.clamp(1, MAX_QUESTION_COUNT);

        let base = self.api_base_url.trim().trim_end_matches('/').to_string();
        match url::Url::parse(&base) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => self.api_base_url = base,
            _ => {
                warn!(
                    api_base_url = %self.api_base_url,
                    "Ignoring invalid API base URL in config"
                );
                self.api_base_url = defaults.api_base_url;
            }
        }
    }

    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mockprep"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file. A file that fails to parse is moved aside
    /// to `config.json.corrupt` and defaults are returned.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Config>(&content) {
            Ok(mut config) => {
                config.sanitize();
                debug!(path = %path.display(), "Loaded config");
                config
            }
            Err(err) => {
                preserve_corrupt_config(path, &content);
                warn!(
                    path = %path.display(),
                    error = %err,
                    "Config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Apply `MOCKPREP_MODEL` and `MOCKPREP_API_BASE_URL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(model) = non_empty("MOCKPREP_MODEL") {
            self.model = model;
        }
        if let Some(base) = non_empty("MOCKPREP_API_BASE_URL") {
            self.api_base_url = base;
        }
        self.sanitize();
        self
    }

    /// Save config to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        self.save_to(&dir.join("config.json"))
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut sanitized = self.clone();
        sanitized.sanitize();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    debug!(error = %e, "Failed to set config directory permissions");
                }
            }
        }

        let content =
            serde_json::to_string_pretty(&sanitized).context("Failed to serialize config")?;
        write_config_atomic(path, &content).context("Failed to write config")
    }

    /// Gemini API key: credentials store first, then environment.
    pub fn api_key(&self) -> Option<String> {
        match keyring::get_api_key() {
            Ok(Some(key)) => return Some(key),
            Ok(None) => {}
            Err(err) => keyring::warn_keychain_error_once("API key", &err),
        }
        api_key_from_env(|name| std::env::var(name).ok())
    }

    /// Store the API key and read it back to confirm.
    pub fn set_api_key(&self, key: &str) -> anyhow::Result<()> {
        let store = keyring::credentials_store_label();
        keyring::set_api_key(key).with_context(|| {
            format!(
                "Failed to store API key in {}. You can set GEMINI_API_KEY instead",
                store
            )
        })?;

        match keyring::get_api_key() {
            Ok(Some(stored)) if stored == key => Ok(()),
            Ok(_) => Err(anyhow!(
                "API key verification failed: key was not persisted to {}. \
                 You can set GEMINI_API_KEY instead.",
                store
            )),
            Err(err) => Err(err.context(format!(
                "API key verification failed: couldn't read back from {}",
                store
            ))),
        }
    }

    /// Gemini keys are 39 characters starting with `AIza`.
    pub fn validate_api_key_format(key: &str) -> bool {
        let key = key.trim();
        key.starts_with("AIza") && key.len() == 39
    }

    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/mockprep/config.json".to_string())
    }
}

fn api_key_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Interactive prompt to set up the API key.
pub fn setup_api_key_interactive() -> anyhow::Result<String> {
    use std::io::{self, Write};

    println!();
    println!("  mockprep setup");
    println!();
    println!("  mockprep uses Google Gemini to write questions and score answers.");
    println!("    1) Create a key at https://aistudio.google.com/app/apikey");
    println!("    2) Paste the key below and press Enter");
    println!();
    println!(
        "  We'll store it in your {}.",
        keyring::credentials_store_label()
    );
    println!("  Prefer env vars? Set GEMINI_API_KEY and skip this step.");
    println!();
    print!("  API Key: ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err(anyhow!("No API key provided"));
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like a Gemini key (usually starts with AIza)");
        println!("     Saving anyway...");
    }

    let config = Config::load();
    config.set_api_key(&key)?;
    config.save()?;

    println!();
    println!("  + API key saved. Settings live at {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            debug!(error = %e, "Failed to set temp config file permissions");
        }
    }

    file.write_all(content.as_bytes())?;
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}
