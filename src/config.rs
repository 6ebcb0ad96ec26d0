use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("kojitag"))
}

/// User settings from ~/.config/kojitag/config.toml
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Hub snapshot used when --state is not given (may start with ~)
    #[serde(default)]
    pub hub_state: Option<String>,

    /// Force check mode for every apply
    #[serde(default)]
    pub check: bool,
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Pick the hub snapshot path: the command line wins over the settings
    pub fn state_path(&self, cli: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli {
            return Ok(path.to_path_buf());
        }

        let configured = self.hub_state.as_deref().context(
            "No hub snapshot configured; pass --state or set hub_state in ~/.config/kojitag/config.toml",
        )?;
        let expanded = shellexpand::tilde(configured);
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_from(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "hub_state = \"/srv/hub.json\"\ncheck = true\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert!(settings.check);
        assert_eq!(
            settings.state_path(None).unwrap(),
            PathBuf::from("/srv/hub.json")
        );
    }

    #[test]
    fn test_cli_state_wins() {
        let settings = Settings {
            hub_state: Some("/srv/hub.json".into()),
            check: false,
        };
        assert_eq!(
            settings.state_path(Some(Path::new("local.json"))).unwrap(),
            PathBuf::from("local.json")
        );
    }

    #[test]
    fn test_tilde_expanded() {
        let settings = Settings {
            hub_state: Some("~/hub.json".into()),
            check: false,
        };
        let path = settings.state_path(None).unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("hub.json"));
    }

    #[test]
    fn test_no_state_configured() {
        let err = Settings::default().state_path(None).unwrap_err();
        assert!(err.to_string().contains("No hub snapshot configured"));
    }
}
