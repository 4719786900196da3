//! Credential storage for mockprep.
//!
//! The Gemini key lives in one system-keychain entry as JSON. When the
//! keychain is disabled or unavailable, a local file with 0600 permissions
//! takes its place.

use anyhow::{anyhow, Context};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{debug, warn};

const KEYRING_SERVICE: &str = "mockprep-credentials";
const KEYRING_USERNAME: &str = "default";

pub const DISABLE_KEYRING_ENV: &str = "MOCKPREP_DISABLE_KEYRING";
pub const CREDENTIALS_FILE_ENV: &str = "MOCKPREP_CREDENTIALS_FILE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gemini_api_key: Option<String>,
}

static CREDENTIALS_CACHE: OnceLock<Mutex<Option<StoredCredentials>>> = OnceLock::new();
static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

fn cache_guard() -> MutexGuard<'static, Option<StoredCredentials>> {
    let cache = CREDENTIALS_CACHE.get_or_init(|| Mutex::new(None));
    match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name)
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_disabled() -> bool {
    if cfg!(test) || env_flag(DISABLE_KEYRING_ENV) {
        return true;
    }

    // A populated credentials file wins over the keychain so headless runs
    // never trigger an interactive unlock prompt.
    matches!(
        read_fallback_credentials(),
        Ok(StoredCredentials {
            gemini_api_key: Some(_)
        })
    )
}

/// Where credentials are kept, for CLI messages.
pub fn credentials_store_label() -> &'static str {
    if keyring_disabled() {
        "local credentials file"
    } else {
        "system keychain"
    }
}

fn fallback_credentials_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var(CREDENTIALS_FILE_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if cfg!(test) {
        return Ok(std::env::temp_dir().join("mockprep-test-credentials.json"));
    }

    dirs::config_dir()
        .map(|p| p.join("mockprep").join("credentials.json"))
        .ok_or_else(|| anyhow!("Could not determine credentials file path"))
}

fn read_fallback_credentials() -> anyhow::Result<StoredCredentials> {
    let path = fallback_credentials_path()?;
    if !path.exists() {
        return Ok(StoredCredentials::default());
    }
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read credentials file '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse credentials file '{}'", path.display()))
}

fn write_fallback_credentials(creds: &StoredCredentials) -> anyhow::Result<()> {
    let path = fallback_credentials_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create credentials directory '{}'",
                parent.display()
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }
    }

    let content = serde_json::to_string(creds).context("Failed to serialize credentials")?;
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp_file = fs::File::create(&tmp_path).with_context(|| {
        format!(
            "Failed to create temp credentials file '{}'",
            tmp_path.display()
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tmp_file.set_permissions(fs::Permissions::from_mode(0o600));
    }

    tmp_file
        .write_all(content.as_bytes())
        .with_context(|| format!("Failed to write credentials file '{}'", tmp_path.display()))?;
    drop(tmp_file);

    if let Err(err) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err)
            .with_context(|| format!("Failed to finalize credentials file '{}'", path.display()));
    }
    Ok(())
}

/// Log a keychain failure once per process.
pub fn warn_keychain_error_once(context: &str, err: &anyhow::Error) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    warn!(
        context,
        error = %err,
        "Couldn't access system keychain; set {}=1 or GEMINI_API_KEY to bypass it",
        DISABLE_KEYRING_ENV
    );
}

fn read_credentials_uncached() -> anyhow::Result<StoredCredentials> {
    if keyring_disabled() {
        return read_fallback_credentials();
    }
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)?;
    match entry.get_password() {
        Ok(json) => serde_json::from_str(&json).context("Failed to parse keychain credentials"),
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.into()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> anyhow::Result<()> {
    if keyring_disabled() {
        return write_fallback_credentials(creds);
    }
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)?;
    let json = serde_json::to_string(creds).context("Failed to serialize credentials")?;
    entry.set_password(&json)?;
    Ok(())
}

fn read_credentials_cached() -> anyhow::Result<StoredCredentials> {
    let mut guard = cache_guard();
    if let Some(creds) = guard.as_ref() {
        return Ok(creds.clone());
    }
    let creds = read_credentials_uncached()?;
    debug!(store = credentials_store_label(), "Loaded stored credentials");
    *guard = Some(creds.clone());
    Ok(creds)
}

#[cfg(test)]
fn reset_for_tests() {
    *cache_guard() = None;
    KEYRING_ERROR_WARNED.store(false, Ordering::Relaxed);
}

// ============================================================================
// Public API
// ============================================================================

/// Stored Gemini API key, if any.
pub fn get_api_key() -> anyhow::Result<Option<String>> {
    Ok(read_credentials_cached()?.gemini_api_key)
}

/// Store the Gemini API key, replacing any previous one.
pub fn set_api_key(key: &str) -> anyhow::Result<()> {
    let mut creds = read_credentials_cached().unwrap_or_default();
    creds.gemini_api_key = Some(key.to_string());
    write_credentials(&creds)?;
    *cache_guard() = Some(creds);
    Ok(())
}
