//! Shared plumbing for command handlers: config resolution, key store and
//! password lookup, exit codes.

use std::path::{Path, PathBuf};

use courier_core::crypto::FileKeyStore;
use courier_core::CourierError;
use dialoguer::Password;
use secrecy::SecretString;

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, CourierConfig};
use crate::ui::UiContext;

/// Exit code for "nothing there yet" conditions (no config, no key).
pub const EXIT_NOT_FOUND: u8 = 3;

/// A required file or setting is absent.
#[derive(Debug)]
pub struct Missing(pub String);

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Missing {}

/// Map an error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<Missing>().is_some() {
        return EXIT_NOT_FOUND;
    }
    match err.downcast_ref::<CourierError>() {
        Some(core) if core.is_not_found() => EXIT_NOT_FOUND,
        _ => 1,
    }
}

/// Config path from `--config` / `COURIER_CONFIG`, else the XDG default.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
        _ => default_config_path(),
    }
}

pub fn missing_config_message(path: &Path) -> String {
    format!(
        "No config found at {}.\nHint: Run `courier init` first.",
        path.display()
    )
}

/// Load the config, failing with exit code 3 if it does not exist.
pub fn load_config(cli: &Cli) -> anyhow::Result<CourierConfig> {
    let path = resolve_config_path(cli)?;
    if !path.exists() {
        return Err(Missing(missing_config_message(&path)).into());
    }
    read_config(&path)
}

/// Log level from the config, if one can be read. Never fails.
pub fn configured_log_level(cli: &Cli) -> Option<String> {
    let path = resolve_config_path(cli).ok()?;
    if !path.exists() {
        return None;
    }
    read_config(&path).ok().map(|config| config.logging.level)
}

pub fn key_store(config: &CourierConfig) -> anyhow::Result<FileKeyStore> {
    Ok(FileKeyStore::new(config.key_file()).with_kdf(config.keys.kdf_params()?))
}

/// Find the key password: explicit value, then the configured env var, then a prompt.
pub fn resolve_password(
    ctx: &UiContext,
    explicit: Option<&str>,
    config: &CourierConfig,
    no_input: bool,
    confirm: bool,
) -> anyhow::Result<SecretString> {
    if let Some(password) = explicit {
        return Ok(SecretString::from(password.to_string()));
    }

    let env_name = config.keys.password_env.as_str();
    if let Some(password) = std::env::var(env_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
    {
        return Ok(SecretString::from(password));
    }

    let interactive = ctx.is_interactive() && !no_input;
    if !interactive {
        return Err(Missing(format!(
            "No key password available.\nHint: Set {} or pass --password.",
            env_name
        ))
        .into());
    }

    let mut prompt = Password::new().with_prompt("Key password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm key password", "Passwords do not match");
    }
    let password = prompt.interact()?;
    if password.trim().is_empty() {
        return Err(anyhow::anyhow!("Key password cannot be empty"));
    }
    Ok(SecretString::from(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_maps_to_not_found_exit() {
        let err: anyhow::Error = Missing("no config".into()).into();
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);
    }

    #[test]
    fn test_core_not_found_maps_to_not_found_exit() {
        let err: anyhow::Error = CourierError::NotFound("no key".into()).into();
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);

        let err: anyhow::Error = CourierError::KeyMismatch.into();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_explicit_password_wins() {
        let config = CourierConfig::new(PathBuf::from("/d"), PathBuf::from("/k"));
        let ctx = UiContext::from_env(false, true, true, false);
        let password = resolve_password(&ctx, Some("hunter2"), &config, true, false).unwrap();
        use secrecy::ExposeSecret;
        assert_eq!(password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_no_input_without_password_is_missing() {
        let mut config = CourierConfig::new(PathBuf::from("/d"), PathBuf::from("/k"));
        config.keys.password_env = "COURIER_TEST_UNSET_PASSWORD".to_string();
        let ctx = UiContext::from_env(false, true, true, false);

        let err = resolve_password(&ctx, None, &config, true, false).unwrap_err();
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);
        assert!(err.to_string().contains("COURIER_TEST_UNSET_PASSWORD"));
    }
}
