//! Application context: which electerm flavour and where its data lives.
//!
//! An [`AppContext`] is built once at startup and handed to every adapter
//! constructor. Adapters only read it; nothing in the workspace mutates it
//! after construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Backend;

/// User namespace used by single-user installations.
pub const DEFAULT_USER: &str = "default_user";

/// electerm distribution flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// Electron desktop application (the default).
    #[default]
    Desktop,
    /// Self-hosted web build.
    Web,
}

impl AppType {
    /// Lowercase name as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Desktop => "desktop",
            AppType::Web => "web",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(AppType::Desktop),
            "web" => Ok(AppType::Web),
            other => Err(CoreError::UnknownAppType(other.to_string())),
        }
    }
}

/// Immutable description of an electerm data location.
///
/// # Examples
///
/// ```
/// use electerm_data_core::{AppContext, AppType, Backend};
/// use std::path::Path;
///
/// let ctx = AppContext::new(AppType::Web, "/srv/data");
/// assert_eq!(
///     ctx.user_dir(Backend::Nedb),
///     Path::new("/srv/data/nedb-database/users/default_user"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    app_type: AppType,
    data_root: PathBuf,
    user: String,
}

impl AppContext {
    /// Creates a context for the default user.
    pub fn new(app_type: AppType, data_root: impl Into<PathBuf>) -> Self {
        Self {
            app_type,
            data_root: data_root.into(),
            user: DEFAULT_USER.to_string(),
        }
    }

    /// Returns a copy of this context scoped to another user namespace.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn app_type(&self) -> AppType {
        self.app_type
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Directory namespace for a backend under this app type.
    pub fn namespace(&self, backend: Backend) -> &'static str {
        match (self.app_type, backend) {
            (AppType::Desktop, _) => "electerm",
            (AppType::Web, Backend::Nedb) => "nedb-database",
            (AppType::Web, Backend::Sqlite) => "sqlite-database",
        }
    }

    /// `<dataRoot>/<namespace>/users/<user>` for the given backend.
    pub fn user_dir(&self, backend: Backend) -> PathBuf {
        self.data_root
            .join(self.namespace(backend))
            .join("users")
            .join(&self.user)
    }
}
