use std::env;
use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirError {
    #[error("Directory not found: {0}")]
    DirNotFound(String),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type DirResult<T> = Result<T, DirError>;

/// Application name used to namespace directories.
pub static APP_NAME: &str = "testiai";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirType {
    Config,
}

impl Display for DirType {
    /// Pretty-print the default directory path hint for this dir type.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "~/{}/{}", self.rel_path(), APP_NAME)
    }
}

impl DirType {
    /// XDG environment variable key for this directory type.
    fn xdg_key(&self) -> &'static str {
        match self {
            DirType::Config => "XDG_CONFIG_HOME",
        }
    }

    /// Relative default path under HOME when XDG is not set.
    fn rel_path(&self) -> &'static str {
        match self {
            DirType::Config => ".config",
        }
    }

    /// Resolve the directory path from XDG or fallback environment hints.
    pub fn get_dir(&self) -> DirResult<PathBuf> {
        if let Some(dir) = env::var_os(self.xdg_key()).filter(|d| !d.is_empty()) {
            Ok(PathBuf::from(dir).join(APP_NAME))
        } else if let Some(home) = env::var_os("HOME").filter(|h| !h.is_empty()) {
            Ok(PathBuf::from(home).join(self.rel_path()).join(APP_NAME))
        } else if let Some(userprofile) = env::var_os("USERPROFILE") {
            Ok(PathBuf::from(userprofile)
                .join(self.rel_path())
                .join(APP_NAME))
        } else {
            Err(DirError::DirNotFound(self.to_string()))
        }
    }

    /// Path of a file inside this directory. The directory is not created.
    pub fn file(&self, name: &str) -> DirResult<PathBuf> {
        Ok(self.get_dir()?.join(name))
    }

    /// Ensure the directory exists, creating it asynchronously if needed.
    pub async fn ensure_dir_async(&self) -> DirResult<PathBuf> {
        let dir = self.get_dir()?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}
