use anyhow::Context;
use agrivoice_core::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PUBLIC_KEY: &str = "AGRIVOICE_PUBLIC_KEY";
pub const ENV_ASSISTANT_ID: &str = "AGRIVOICE_ASSISTANT_ID";
pub const ENV_API_BASE_URL: &str = "AGRIVOICE_API_BASE_URL";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// Loads the file if present, otherwise the built-in defaults.
    pub fn load_or_default(&self) -> anyhow::Result<AppConfig> {
        if self.exists() {
            self.load()
        } else {
            log::info!(
                "no config at {}; using defaults",
                self.path.display()
            );
            Ok(crate::defaults::default_app_config())
        }
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory: {}", parent.display()))?;
        }

        // Write temp then replace, so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write temp: {}", tmp.display()))?;
        replace_file(&tmp, &self.path)
            .with_context(|| format!("replace file: {}", self.path.display()))?;
        Ok(())
    }
}

fn replace_file(tmp: &Path, dst: &Path) -> anyhow::Result<()> {
    let backup = dst.with_extension("bak");

    if dst.exists() {
        let _ = fs::remove_file(&backup);
        fs::rename(dst, &backup)
            .with_context(|| format!("failed rename {} -> {}", dst.display(), backup.display()))?;
    }

    if let Err(e) = fs::rename(tmp, dst) {
        if backup.exists() {
            let _ = fs::rename(&backup, dst);
        }
        let _ = fs::remove_file(tmp);
        return Err(anyhow::Error::new(e).context(format!(
            "failed rename {} -> {}",
            tmp.display(),
            dst.display()
        )));
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

/// Layers environment values over the file config. Blank values are ignored.
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_PUBLIC_KEY) {
        cfg.voice.public_key = Some(v);
    }
    if let Some(v) = get(ENV_ASSISTANT_ID) {
        cfg.voice.assistant_id = Some(v);
    }
    if let Some(v) = get(ENV_API_BASE_URL) {
        cfg.api_base_url = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("nested").join("agrivoice.json"));

        let mut cfg = crate::defaults::default_app_config();
        cfg.voice.public_key = Some("pk-live".into());
        cfg.voice.assistant_id = Some("0f8fad5b-d9cb-469f-a165-70867728950e".into());

        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), cfg);

        // Second save replaces the first and leaves no temp or backup behind.
        cfg.api_base_url = "https://farm.example.com/api".into();
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap().api_base_url, "https://farm.example.com/api");
        let names: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("agrivoice.json")]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("absent.json"));
        assert!(store.load().is_err());
        assert_eq!(
            store.load_or_default().unwrap(),
            crate::defaults::default_app_config()
        );
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrivoice.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = ConfigStore::at_path(path).load_or_default().unwrap_err();
        assert!(format!("{err:#}").contains("decode config JSON"));
    }

    #[test]
    fn env_overrides_skip_blank_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_PUBLIC_KEY, "pk-env"),
            (ENV_ASSISTANT_ID, "  "),
            (ENV_API_BASE_URL, "https://api.example.com"),
        ]);
        let mut cfg = crate::defaults::default_app_config();
        cfg.voice.assistant_id = Some("from-file".into());

        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.voice.public_key.as_deref(), Some("pk-env"));
        assert_eq!(cfg.voice.assistant_id.as_deref(), Some("from-file"));
        assert_eq!(cfg.api_base_url, "https://api.example.com");
    }
}
