use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolve the agaudit data directory:
/// 1. Explicit `--data-dir`
/// 2. `AGAUDIT_PATH` environment variable
/// 3. XDG data directory
/// 4. `~/.agaudit`
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("AGAUDIT_PATH") {
        return Ok(expand_tilde(Path::new(&env_path)));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("agaudit"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".agaudit"));
    }

    bail!("Could not determine data directory: no HOME or XDG data directory found")
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(stripped) = path.to_str().and_then(|s| s.strip_prefix("~/"))
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    path.to_path_buf()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Root directory of recorded sessions (`<root>/<agent>/<session>.json`)
    #[serde(default)]
    pub sessions_root: Option<PathBuf>,
}

impl Config {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join("config.toml")
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Ok(toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;
        let path = Self::path(data_dir);
        std::fs::write(&path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert!(config.sessions_root.is_none());
    }

    #[test]
    fn config_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            sessions_root: Some(PathBuf::from("/srv/sessions")),
        };
        config.save(tmp.path()).unwrap();

        let loaded = Config::load(tmp.path()).unwrap();
        assert_eq!(loaded.sessions_root, Some(PathBuf::from("/srv/sessions")));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/agaudit-data"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/agaudit-data"));
    }
}
