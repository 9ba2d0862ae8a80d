//! API key storage
//!
//! Lookup order: configured environment variable, OS keyring, then a 0600
//! file in the config directory for systems without a keyring.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SERVICE_NAME: &str = "learnmap";
const API_KEY_USERNAME: &str = "llm-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Get the path for the fallback API key file
fn api_key_file_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "learnmap", "learnmap")
        .context("Failed to get project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("Failed to create config directory")?;
    Ok(dir.join(API_KEY_FILE))
}

/// Set API key - tries keyring first, falls back to file
pub fn set_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key is empty");
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if entry.set_password(key).is_ok() {
            // Keep a file copy in case keyring retrieval fails later
            let _ = save_to_file(&api_key_file_path()?, key);
            return Ok(());
        }
    }

    save_to_file(&api_key_file_path()?, key)?;
    println!("Note: Using file-based storage (keyring unavailable)");
    Ok(())
}

fn save_to_file(path: &Path, key: &str) -> Result<()> {
    fs::write(path, key).context("Failed to write API key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

fn read_from_file(path: &Path) -> Option<String> {
    let key = fs::read_to_string(path).ok()?;
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

/// Resolve the API key, checking `env_var` before the stored copies.
pub fn get_api_key(env_var: &str) -> Result<String> {
    if let Ok(key) = std::env::var(env_var) {
        if !key.trim().is_empty() {
            debug!("Using API key from ${}", env_var);
            return Ok(key.trim().to_string());
        }
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USERNAME) {
        if let Ok(key) = entry.get_password() {
            debug!("Using API key from keyring");
            return Ok(key);
        }
    }

    let path = api_key_file_path()?;
    read_from_file(&path).with_context(|| {
        format!(
            "No API key found. Set ${} or run 'learnmap config --set-api-key YOUR_KEY' first.",
            env_var
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_fallback_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(API_KEY_FILE);
        save_to_file(&path, "sk-test").unwrap();
        assert_eq!(read_from_file(&path).as_deref(), Some("sk-test"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_blank_file_is_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(API_KEY_FILE);
        fs::write(&path, "  \n").unwrap();
        assert!(read_from_file(&path).is_none());
        assert!(read_from_file(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_env_var_wins() {
        std::env::set_var("LEARNMAP_TEST_KEY_ENV", " sk-env ");
        assert_eq!(get_api_key("LEARNMAP_TEST_KEY_ENV").unwrap(), "sk-env");
        std::env::remove_var("LEARNMAP_TEST_KEY_ENV");
    }
}
