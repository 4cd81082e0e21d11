//! Tool configuration and data-root resolution.
//!
//! Settings may come from an optional YAML file; command-line flags and the
//! `APP_PATH` environment variable take precedence over it.
//!
//! # Example YAML
//!
//! ```yaml
//! app_path: /home/me/.config
//! app_type: web
//! user: default_user
//! ```

use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::{AppContext, AppType};
use crate::error::{CoreError, Result};

/// Environment variable that overrides the platform data root.
pub const APP_PATH_ENV: &str = "APP_PATH";

/// Settings for locating electerm data.
///
/// Every field is optional so a partial file only overrides what it names.
///
/// # Examples
///
/// ```
/// use electerm_data_core::{AppType, ToolConfig};
///
/// let config = ToolConfig {
///     app_path: Some("/data".into()),
///     app_type: Some(AppType::Web),
///     user: None,
/// };
/// let ctx = config.resolve(None).unwrap();
/// assert_eq!(ctx.app_type(), AppType::Web);
/// assert_eq!(ctx.user(), "default_user");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Data root; the platform config directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<PathBuf>,
    /// electerm flavour; desktop when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_type: Option<AppType>,
    /// User namespace; `default_user` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ToolConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IoError`] if the file cannot be read, or
    /// [`CoreError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Fills unset fields from `other`, keeping values already present.
    pub fn or(self, other: ToolConfig) -> ToolConfig {
        ToolConfig {
            app_path: self.app_path.or(other.app_path),
            app_type: self.app_type.or(other.app_type),
            user: self.user.or(other.user),
        }
    }

    /// Builds the [`AppContext`].
    ///
    /// The data root is, in order: `env_app_path` (the value of
    /// [`APP_PATH_ENV`], passed in by the caller), `app_path`, then the
    /// platform config directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoDataRoot`] when nothing is configured and the
    /// platform has no config directory.
    pub fn resolve(&self, env_app_path: Option<PathBuf>) -> Result<AppContext> {
        let data_root = env_app_path
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.app_path.clone())
            .or_else(default_app_path)
            .ok_or(CoreError::NoDataRoot)?;

        let mut ctx = AppContext::new(self.app_type.unwrap_or_default(), data_root);
        if let Some(user) = &self.user {
            ctx = ctx.with_user(user.clone());
        }
        Ok(ctx)
    }
}

/// Platform default data root: `~/.config` on Linux,
/// `~/Library/Application Support` on macOS, `%APPDATA%` on Windows.
pub fn default_app_path() -> Option<PathBuf> {
    dirs::config_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_path_wins_over_config() {
        let config = ToolConfig {
            app_path: Some("/from/config".into()),
            ..Default::default()
        };
        let ctx = config.resolve(Some("/from/env".into())).unwrap();
        assert_eq!(ctx.data_root(), Path::new("/from/env"));
    }

    #[test]
    fn test_empty_env_path_is_ignored() {
        let config = ToolConfig {
            app_path: Some("/from/config".into()),
            ..Default::default()
        };
        let ctx = config.resolve(Some(PathBuf::new())).unwrap();
        assert_eq!(ctx.data_root(), Path::new("/from/config"));
    }

    #[test]
    fn test_or_keeps_present_values() {
        let flags = ToolConfig {
            app_type: Some(AppType::Web),
            ..Default::default()
        };
        let file = ToolConfig {
            app_path: Some("/file".into()),
            app_type: Some(AppType::Desktop),
            user: Some("bob".into()),
        };
        let merged = flags.or(file);
        assert_eq!(merged.app_type, Some(AppType::Web));
        assert_eq!(merged.app_path, Some(PathBuf::from("/file")));
        assert_eq!(merged.user.as_deref(), Some("bob"));
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.yaml");
        std::fs::write(&path, "app_path: /data\napp_type: web\nuser: carol\n").unwrap();

        let config = ToolConfig::load(&path).unwrap();
        assert_eq!(config.app_type, Some(AppType::Web));
        let ctx = config.resolve(None).unwrap();
        assert_eq!(ctx.user(), "carol");
        assert_eq!(ctx.data_root(), Path::new("/data"));
    }

    #[test]
    fn test_load_rejects_unknown_app_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.yaml");
        std::fs::write(&path, "app_type: mobile\n").unwrap();
        assert!(matches!(ToolConfig::load(&path), Err(CoreError::YamlError(_))));
    }
}
