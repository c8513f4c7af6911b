use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// The dashboard's remembered inputs, reloaded on the next session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub query: String,
    pub months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query: "큐리옥스바이오시스템즈".to_string(),
            months: 6,
        }
    }
}

pub struct SettingsStore {
    base_dir: PathBuf,
}

impl SettingsStore {
    /// Resolves the storage path relative to the running binary and creates
    /// the directory immediately, so saves never have to check for it.
    pub async fn open_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }

        Ok(Self { base_dir })
    }

    /// Loads the saved settings, falling back to the defaults when the file
    /// is missing or unreadable. The month window is re-clamped on load in
    /// case the file was edited by hand.
    pub async fn load(&self) -> Settings {
        match self.try_load().await {
            Ok(mut settings) => {
                settings.months = settings.months.clamp(1, 12);
                settings
            }
            Err(_) => Settings::default(),
        }
    }

    async fn try_load(&self) -> anyhow::Result<Settings> {
        let content = fs::read(self.settings_path()).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Writes to a `.tmp` file first and renames it into place, so a crash
    /// mid-write leaves the previous settings intact.
    pub async fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let final_path = self.settings_path();
        let tmp_path = self.base_dir.join("settings.json.tmp");

        let json_bytes = serde_json::to_vec_pretty(settings)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }
}
