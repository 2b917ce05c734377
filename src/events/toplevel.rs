use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Значение `activated` в массиве состояний zwlr_foreign_toplevel_handle_v1
pub const STATE_ACTIVATED: u32 = 2;
/// Значение `minimized` в массиве состояний zwlr_foreign_toplevel_handle_v1
pub const STATE_MINIMIZED: u32 = 1;

/// Идентификатор окна, выданный композитором (protocol id хэндла)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToplevelId(pub u32);

impl ToplevelId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ToplevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for ToplevelId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(ToplevelId)
    }
}

/// Флаги состояния окна, которые интересуют панель
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateFlags {
    pub activated: bool,
    pub minimized: bool,
}

impl StateFlags {
    /// Разобрать полный набор состояний. Остальные значения (maximized, fullscreen) игнорируются.
    pub fn from_raw(raw: &[u32]) -> Self {
        let mut flags = Self::default();
        for value in raw {
            match *value {
                STATE_ACTIVATED => flags.activated = true,
                STATE_MINIMIZED => flags.minimized = true,
                _ => {}
            }
        }
        flags
    }

    pub fn with_activated(mut self, activated: bool) -> Self {
        self.activated = activated;
        self
    }

    #[allow(dead_code)]
    pub fn with_minimized(mut self, minimized: bool) -> Self {
        self.minimized = minimized;
        self
    }
}

/// Событие хэндла окна, уже отвязанное от конкретного протокола
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    Title(String),
    AppId(String),
    State(StateFlags),
    OutputEnter,
    OutputLeave,
    Parent(Option<ToplevelId>),
    /// Конец пакета изменений: всё накопленное применяется разом
    Done,
    Closed,
}

impl HandleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HandleEvent::Title(_) => "title",
            HandleEvent::AppId(_) => "app_id",
            HandleEvent::State(_) => "state",
            HandleEvent::OutputEnter => "output_enter",
            HandleEvent::OutputLeave => "output_leave",
            HandleEvent::Parent(_) => "parent",
            HandleEvent::Done => "done",
            HandleEvent::Closed => "closed",
        }
    }
}

/// Зафиксированное (после `done`) состояние окна, которое видят потребители
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToplevelSnapshot {
    pub id: ToplevelId,
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub activated: bool,
    pub minimized: bool,
    /// false, пока не пришёл первый `done`
    pub configured: bool,
}

impl ToplevelSnapshot {
    pub fn new(id: ToplevelId) -> Self {
        Self {
            id,
            title: None,
            app_id: None,
            activated: false,
            minimized: false,
            configured: false,
        }
    }

    #[allow(dead_code)]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn with_app_id(mut self, app_id: &str) -> Self {
        self.app_id = Some(app_id.to_string());
        self
    }

    /// Заголовок, иначе app_id
    pub fn display_name(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.app_id.as_deref().filter(|a| !a.is_empty()))
    }

    /// Проверить, соответствует ли окно паттерну (регистронезависимо)
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        let pattern_lower = pattern.to_lowercase();
        let title_lower = self.title.as_deref().unwrap_or("").to_lowercase();
        let app_id_lower = self.app_id.as_deref().unwrap_or("").to_lowercase();
        title_lower.contains(&pattern_lower) || app_id_lower.contains(&pattern_lower)
    }
}

impl fmt::Display for ToplevelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title.as_deref().unwrap_or("");
        match self.app_id.as_deref() {
            Some(app_id) if !app_id.is_empty() => write!(f, "{} \"{}\" ({})", self.id, title, app_id)?,
            _ => write!(f, "{} \"{}\"", self.id, title)?,
        }
        if self.activated {
            write!(f, " [active]")?;
        }
        if self.minimized {
            write!(f, " [minimized]")?;
        }
        Ok(())
    }
}

/// Уведомление подписчикам реестра
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    /// Новое окно, поля ещё пустые
    Added(ToplevelSnapshot),
    /// Пакет изменений зафиксирован по `done`
    Updated(ToplevelSnapshot),
    Removed(ToplevelId),
    /// Соединение разорвано, все окна удалены одним уведомлением
    Cleared(Vec<ToplevelId>),
}

impl RegistryChange {
    #[allow(dead_code)]
    pub fn id(&self) -> Option<ToplevelId> {
        match self {
            RegistryChange::Added(s) | RegistryChange::Updated(s) => Some(s.id),
            RegistryChange::Removed(id) => Some(*id),
            RegistryChange::Cleared(_) => None,
        }
    }
}

impl fmt::Display for RegistryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryChange::Added(s) => write!(f, "added {}", s),
            RegistryChange::Updated(s) => write!(f, "updated {}", s),
            RegistryChange::Removed(id) => write!(f, "removed {}", id),
            RegistryChange::Cleared(ids) => write!(f, "cleared {} windows", ids.len()),
        }
    }
}
