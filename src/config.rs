use crate::services::RestorePolicy;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub wayland: WaylandConfig,
    pub tasklist: TasklistConfig,
    pub show_desktop: ShowDesktopConfig,
    pub dry_run: DryRunConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaylandConfig {
    /// Ограничение на стартовые round-trip'ы к композитору
    pub discovery_timeout_ms: u64,
    pub manager_version: u32,
    pub seat_version: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasklistConfig {
    pub enable: bool,
    pub label_max_chars: usize,
    pub placeholder_label: String,
    pub fallback_icon: String,
    #[serde(default)]
    pub desktop_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShowDesktopConfig {
    pub enable: bool,
    #[serde(default)]
    pub restore_policy: RestorePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DryRunConfig {
    pub tick_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for WaylandConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: 2000,
            manager_version: 3,
            seat_version: 7,
        }
    }
}

impl Default for TasklistConfig {
    fn default() -> Self {
        Self {
            enable: true,
            label_max_chars: 15,
            placeholder_label: "Loading...".to_string(),
            fallback_icon: "application-x-executable".to_string(),
            desktop_dirs: Vec::new(),
        }
    }
}

impl Default for ShowDesktopConfig {
    fn default() -> Self {
        Self {
            enable: true,
            restore_policy: RestorePolicy::ActivateAll,
        }
    }
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self { tick_ms: 250 }
    }
}

impl Config {
    /// Встроенные значения ← TOML файл ← переменные окружения PANEL_*
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PANEL_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек Wayland
        if self.wayland.discovery_timeout_ms < 100 {
            anyhow::bail!("discovery_timeout_ms должно быть минимум 100");
        }

        if !(1..=3).contains(&self.wayland.manager_version) {
            anyhow::bail!(
                "manager_version должно быть от 1 до 3, получено {}",
                self.wayland.manager_version
            );
        }

        if !(1..=9).contains(&self.wayland.seat_version) {
            anyhow::bail!(
                "seat_version должно быть от 1 до 9, получено {}",
                self.wayland.seat_version
            );
        }

        // Валидация панели задач
        if self.tasklist.label_max_chars == 0 {
            anyhow::bail!("label_max_chars должно быть больше 0");
        }

        if self.dry_run.tick_ms == 0 {
            anyhow::bail!("tick_ms должно быть больше 0");
        }

        Ok(())
    }
}
