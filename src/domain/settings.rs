use crate::infrastructure::bluetooth::protocol::WordOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "heart_rate_monitor".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    /// Peripheral identifiers connected to before, most recent last.
    #[serde(default)]
    pub known_peripherals: Vec<String>,

    /// Byte order of 16-bit heart rate and energy fields.
    #[serde(default)]
    pub heart_rate_word_order: WordOrder,

    // Simulated strap used by the demo binary
    #[serde(default = "default_device_name")]
    pub simulated_device_name: String,
    #[serde(default = "default_base_bpm")]
    pub simulated_base_bpm: u16,
    #[serde(default = "default_notify_interval_ms")]
    pub notify_interval_ms: u64,
    #[serde(default = "default_demo_duration_secs")]
    pub demo_duration_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            known_peripherals: Vec::new(),
            heart_rate_word_order: WordOrder::default(),
            simulated_device_name: default_device_name(),
            simulated_base_bpm: default_base_bpm(),
            notify_interval_ms: default_notify_interval_ms(),
            demo_duration_secs: default_demo_duration_secs(),
        }
    }
}

fn default_device_name() -> String {
    "Simulated HRM".to_string()
}
fn default_base_bpm() -> u16 {
    72
}
fn default_notify_interval_ms() -> u64 {
    1000
}
fn default_demo_duration_secs() -> u64 {
    15
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load settings from `settings_path`, falling back to defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("HeartRateMonitor");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Remember `id`, moving it to the most recent position, and save.
    pub fn add_known_peripheral(&mut self, id: &str) -> anyhow::Result<()> {
        let known = &mut self.settings.known_peripherals;
        if known.last().map(String::as_str) == Some(id) {
            return Ok(());
        }
        known.retain(|k| k != id);
        known.push(id.to_string());
        self.save()
    }

    /// Replace the known peripherals, oldest first, and save once.
    pub fn set_known_peripherals<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> anyhow::Result<()> {
        self.settings.known_peripherals = ids.into_iter().map(str::to_string).collect();
        self.save()
    }
}
