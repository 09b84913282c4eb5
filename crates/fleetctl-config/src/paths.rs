//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for the fleetctl controller-manager.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    /// Create a new Paths instance with XDG discovery
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("io", "fleetctl", "fleetctl"),
        }
    }

    /// Get user config directory (~/.config/fleetctl/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("failed to determine user config directory".to_string())
            })
    }

    /// Get user cache directory (~/.cache/fleetctl/)
    pub fn user_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.cache_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("failed to determine user cache directory".to_string())
            })
    }

    /// Get user config file path (~/.config/fleetctl/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Get project config file path (fleetctl.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("fleetctl.toml")
    }

    /// Get local config file path (fleetctl.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("fleetctl.local.toml")
    }

    /// Get the controller-manager's on-disk state directory
    pub fn state_dir(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(".fleetctl")
    }

    /// Check if a project directory carries a fleetctl.toml
    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        let paths = Paths::new();

        // These should not panic (though paths may vary by platform)
        if let Ok(config_dir) = paths.user_config_dir() {
            assert!(config_dir.to_string_lossy().contains("fleetctl"));
        }

        if let Ok(cache_dir) = paths.user_cache_dir() {
            assert!(cache_dir.to_string_lossy().contains("fleetctl"));
        }
    }

    #[test]
    fn test_project_paths() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_file = Paths::project_config_file(project_dir);
        assert_eq!(config_file, project_dir.join("fleetctl.toml"));

        let local_file = Paths::local_config_file(project_dir);
        assert_eq!(local_file, project_dir.join("fleetctl.local.toml"));

        let state_dir = Paths::state_dir(project_dir);
        assert_eq!(state_dir, project_dir.join(".fleetctl"));

        assert!(!Paths::is_initialized(project_dir));

        std::fs::write(&config_file, "[store]\nmaster = \"https://example.invalid\"\n").unwrap();
        assert!(Paths::is_initialized(project_dir));
    }
}
