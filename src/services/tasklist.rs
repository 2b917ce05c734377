use super::backend::ProtocolBackend;
use super::window_service::WindowService;
use crate::config::TasklistConfig;
use crate::error::Result;
use crate::events::{RegistryChange, ToplevelId, ToplevelSnapshot};
use crate::trace_if_enabled;
use crate::utils::IconResolver;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Кнопка окна в панели задач
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: ToplevelId,
    pub label: String,
    pub icon: String,
    pub activated: bool,
    pub minimized: bool,
}

/// Что сделает клик по кнопке
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Activate,
    Minimize,
}

impl ClickAction {
    /// Отправить команду через сервис
    pub fn perform<B: ProtocolBackend>(self, service: &mut WindowService<B>, id: ToplevelId) -> Result<()> {
        debug!("Клик по окну {}: {:?}", id, self);
        match self {
            ClickAction::Minimize => service.minimize(id),
            ClickAction::Activate => service.activate(id),
        }
    }
}

/// Обрезать подпись до `max_chars` символов с многоточием в конце
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut label: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    label.push('…');
    label
}

/// Tasklist consumer: one entry per registry record, in announcement order.
pub struct TasklistView {
    entries: Vec<TaskEntry>,
    active: Option<ToplevelId>,
    label_max_chars: usize,
    placeholder_label: String,
    icons: Box<dyn IconResolver>,
}

impl TasklistView {
    pub fn new(config: &TasklistConfig, icons: Box<dyn IconResolver>) -> Self {
        Self {
            entries: Vec::new(),
            active: None,
            label_max_chars: config.label_max_chars,
            placeholder_label: config.placeholder_label.clone(),
            icons,
        }
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    pub fn get(&self, id: ToplevelId) -> Option<&TaskEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Кнопка активного окна
    pub fn active(&self) -> Option<ToplevelId> {
        self.active
    }

    /// Заполнить список по текущему состоянию реестра (при подписке)
    pub fn populate(&mut self, records: &[ToplevelSnapshot]) {
        self.entries.clear();
        self.active = None;
        for record in records {
            self.upsert(record);
        }
        info!("Панель задач: {} окон", self.entries.len());
    }

    pub fn apply(&mut self, change: &RegistryChange) {
        trace_if_enabled!("Панель задач: {}", change);

        match change {
            RegistryChange::Added(record) | RegistryChange::Updated(record) => self.upsert(record),
            RegistryChange::Removed(id) => self.remove(*id),
            RegistryChange::Cleared(_) => {
                self.entries.clear();
                self.active = None;
                debug!("Панель задач очищена");
            }
        }
    }

    /// Активное и не свёрнутое окно сворачивается, любое другое активируется
    pub fn click_action(&self, id: ToplevelId) -> Option<ClickAction> {
        self.get(id).map(|entry| {
            if entry.activated && !entry.minimized {
                ClickAction::Minimize
            } else {
                ClickAction::Activate
            }
        })
    }

    /// Текстовое представление панели, по строке на окно
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let marker = if Some(entry.id) == self.active { '*' } else { ' ' };
            let _ = write!(out, "{} {:>5} [{}] {}", marker, entry.id.to_string(), entry.icon, entry.label);
            if entry.minimized {
                out.push_str(" (свёрнуто)");
            }
            out.push('\n');
        }
        out
    }

    fn label_for(&self, record: &ToplevelSnapshot) -> String {
        match record.display_name() {
            Some(name) => ellipsize(name, self.label_max_chars),
            None => self.placeholder_label.clone(),
        }
    }

    fn upsert(&mut self, record: &ToplevelSnapshot) {
        let entry = TaskEntry {
            id: record.id,
            label: self.label_for(record),
            icon: self.icons.resolve(record.app_id.as_deref()),
            activated: record.activated,
            minimized: record.minimized,
        };

        if entry.activated {
            self.active = Some(entry.id);
        } else if self.active == Some(entry.id) {
            self.active = None;
        }

        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    fn remove(&mut self, id: ToplevelId) {
        self.entries.retain(|e| e.id != id);
        if self.active == Some(id) {
            self.active = None;
        }
    }
}
