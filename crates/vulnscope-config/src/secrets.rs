//! API key retrieval by secret id.
//!
//! Resolution order:
//! 1. System keyring (if `keyring` feature enabled)
//! 2. Environment variable: the backend's (`GEMINI_API_KEY`), then the
//!    upper-cased secret id
//! 3. Secret file `{secrets_dir}/{secret_id}`
//! 4. Config file (with warning)
//!
//! Keyring entries are stored as service="vulnscope", user="<secret_id>".

use std::path::{Path, PathBuf};

use crate::{ConfigError, EngineConfig, Result};

/// Keyring service name.
const SERVICE_NAME: &str = "vulnscope";

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// OS keyring (macOS Keychain, Linux secret-service, Windows Credential Manager).
    Keyring,
    /// Environment variable.
    EnvVar(String),
    /// One-secret-per-file directory.
    SecretFile(PathBuf),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Keyring => write!(f, "system keyring"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::SecretFile(path) => write!(f, "secret file {}", path.display()),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve the engine API key from the process environment.
pub fn resolve_api_key(engine: &EngineConfig) -> Result<ResolvedSecret> {
    resolve_api_key_with(engine, |name| std::env::var(name).ok())
}

/// Resolve the engine API key using `lookup` for environment variables.
pub fn resolve_api_key_with<F>(engine: &EngineConfig, lookup: F) -> Result<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    let secret_id = engine.secret_id.as_str();

    // 1. Keyring
    if let Some(secret) = get_from_keyring(secret_id) {
        return Ok(secret);
    }

    // 2. Environment
    let backend_var = engine.backend.env_var();
    let id_var = secret_id.to_uppercase();
    for var in [backend_var, id_var.as_str()] {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            return Ok(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(var.to_string()),
            });
        }
    }

    // 3. Secret file
    let secrets_dir = engine.secrets_dir.clone().or_else(default_secrets_dir);
    if let Some(dir) = &secrets_dir
        && let Some(secret) = read_secret_file(dir, secret_id)?
    {
        return Ok(secret);
    }

    // 4. Config file
    if let Some(value) = engine.api_key.as_deref().filter(|v| !v.is_empty()) {
        return Ok(ResolvedSecret {
            value: value.to_string(),
            source: SecretSource::ConfigFile,
        });
    }

    Err(ConfigError::ApiKeyNotFound {
        secret_id: secret_id.to_string(),
        env_var: backend_var.to_string(),
        secrets_dir: secrets_dir
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "<none>".to_string()),
    })
}

/// `~/.config/vulnscope/secrets`.
pub fn default_secrets_dir() -> Option<PathBuf> {
    crate::xdg_config_dir().map(|d| d.join("secrets"))
}

fn read_secret_file(dir: &Path, secret_id: &str) -> Result<Option<ResolvedSecret>> {
    // Secret ids become file names.
    if secret_id.is_empty() || secret_id.contains(['/', '\\']) || secret_id.starts_with('.') {
        return Err(ConfigError::InvalidValue {
            field: "engine.secret_id".to_string(),
            reason: format!("'{}' is not a valid secret name", secret_id),
        });
    }
    let path = dir.join(secret_id);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let value = contents.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(ResolvedSecret {
        value: value.to_string(),
        source: SecretSource::SecretFile(path),
    }))
}

/// Store a secret in the system keyring.
pub fn store_in_keyring(secret_id: &str, value: &str) -> std::result::Result<(), String> {
    store_keyring_entry(SERVICE_NAME, secret_id, value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyring implementation (feature-gated)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "keyring")]
fn get_from_keyring(secret_id: &str) -> Option<ResolvedSecret> {
    // Tests stay isolated from the local keychain.
    if cfg!(test) {
        return None;
    }

    let entry = keyring::Entry::new(SERVICE_NAME, secret_id).ok()?;
    let value = entry.get_password().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(ResolvedSecret {
        value,
        source: SecretSource::Keyring,
    })
}

#[cfg(feature = "keyring")]
fn store_keyring_entry(service: &str, user: &str, secret: &str) -> std::result::Result<(), String> {
    if cfg!(test) {
        return Err("keyring access disabled in tests".to_string());
    }
    let entry = keyring::Entry::new(service, user).map_err(|e| format!("keyring error: {}", e))?;
    entry
        .set_password(secret)
        .map_err(|e| format!("failed to store in keyring: {}", e))
}

#[cfg(not(feature = "keyring"))]
fn get_from_keyring(_secret_id: &str) -> Option<ResolvedSecret> {
    None
}

#[cfg(not(feature = "keyring"))]
fn store_keyring_entry(
    _service: &str,
    _user: &str,
    _secret: &str,
) -> std::result::Result<(), String> {
    Err("keyring support not compiled in (enable the 'keyring' feature)".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_with_dir(dir: &Path) -> EngineConfig {
        EngineConfig {
            secrets_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_backend_env_var_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gemini_api_key"), "from-file").unwrap();
        let resolved = resolve_api_key_with(&engine_with_dir(dir.path()), |name| {
            (name == "GEMINI_API_KEY").then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(resolved.value, "from-env");
        assert_eq!(resolved.source, SecretSource::EnvVar("GEMINI_API_KEY".into()));
    }

    #[test]
    fn test_secret_id_env_var() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_with_dir(dir.path());
        engine.secret_id = "prod_gemini".into();
        let resolved = resolve_api_key_with(&engine, |name| {
            (name == "PROD_GEMINI").then(|| "k".to_string())
        })
        .unwrap();
        assert_eq!(resolved.source, SecretSource::EnvVar("PROD_GEMINI".into()));
    }

    #[test]
    fn test_secret_file_trimmed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gemini_api_key"), "  abc123\n").unwrap();
        let resolved = resolve_api_key_with(&engine_with_dir(dir.path()), no_env).unwrap();
        assert_eq!(resolved.value, "abc123");
        assert!(matches!(resolved.source, SecretSource::SecretFile(_)));
    }

    #[test]
    fn test_config_value_last() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_with_dir(dir.path());
        engine.api_key = Some("plain".into());
        let resolved = resolve_api_key_with(&engine, no_env).unwrap();
        assert_eq!(resolved.value, "plain");
        assert_eq!(resolved.source, SecretSource::ConfigFile);
    }

    #[test]
    fn test_not_found() {
        let dir = TempDir::new().unwrap();
        let err = resolve_api_key_with(&engine_with_dir(dir.path()), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ApiKeyNotFound { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_path_like_secret_id_rejected() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_with_dir(dir.path());
        engine.secret_id = "../etc/passwd".into();
        let err = resolve_api_key_with(&engine, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_secret_source_display() {
        assert_eq!(SecretSource::Keyring.to_string(), "system keyring");
        assert_eq!(
            SecretSource::EnvVar("GEMINI_API_KEY".to_string()).to_string(),
            "env var GEMINI_API_KEY"
        );
        assert_eq!(
            SecretSource::ConfigFile.to_string(),
            "config file (plaintext)"
        );
    }

    #[cfg(not(feature = "keyring"))]
    #[test]
    fn test_store_keyring_disabled() {
        let result = store_in_keyring("gemini_api_key", "test-key");
        assert!(result.unwrap_err().contains("not compiled"));
    }
}
