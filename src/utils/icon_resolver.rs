use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Системные каталоги desktop-файлов, просматриваются после пользовательских
const SYSTEM_APPLICATION_DIRS: [&str; 2] = ["/usr/local/share/applications", "/usr/share/applications"];

/// Подбор имени иконки для окна по его app_id
pub trait IconResolver {
    fn resolve(&self, app_id: Option<&str>) -> String;
}

/// Ищет `Icon=` в desktop-файле приложения.
///
/// Best effort: если файл не найден или не читается, иконкой считается сам
/// app_id, а окну без app_id достаётся запасная иконка.
pub struct DesktopEntryIconResolver {
    dirs: Vec<PathBuf>,
    fallback: String,
    cache: RefCell<HashMap<String, String>>,
}

impl DesktopEntryIconResolver {
    /// Дополнительные каталоги, затем $XDG_DATA_HOME/applications и системные
    pub fn new(extra_dirs: &[PathBuf], fallback: &str) -> Self {
        let mut dirs: Vec<PathBuf> = extra_dirs.to_vec();
        if let Some(data_dir) = dirs::data_dir() {
            dirs.push(data_dir.join("applications"));
        }
        dirs.extend(SYSTEM_APPLICATION_DIRS.iter().map(PathBuf::from));
        Self::with_dirs(dirs, fallback)
    }

    /// Только указанные каталоги
    pub fn with_dirs(dirs: Vec<PathBuf>, fallback: &str) -> Self {
        Self {
            dirs,
            fallback: fallback.to_string(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn find_desktop_file(&self, app_id: &str) -> Option<PathBuf> {
        let candidates = [
            format!("{}.desktop", app_id),
            format!("org.{}.desktop", app_id),
            format!("com.{}.desktop", app_id),
        ];

        self.dirs
            .iter()
            .flat_map(|dir| candidates.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file())
    }

    fn lookup(&self, app_id: &str) -> String {
        let icon = self
            .find_desktop_file(app_id)
            .and_then(|path| {
                debug!("Desktop-файл для {}: {:?}", app_id, path);
                read_icon_entry(&path)
            })
            .filter(|icon| !icon.is_empty());

        // Многие приложения называют иконку так же, как app_id
        icon.unwrap_or_else(|| app_id.to_string())
    }
}

impl IconResolver for DesktopEntryIconResolver {
    fn resolve(&self, app_id: Option<&str>) -> String {
        let Some(app_id) = app_id.filter(|a| !a.is_empty()) else {
            return self.fallback.clone();
        };

        if let Some(icon) = self.cache.borrow().get(app_id) {
            return icon.clone();
        }

        let icon = self.lookup(app_id);
        self.cache.borrow_mut().insert(app_id.to_string(), icon.clone());
        icon
    }
}

/// Значение `Icon=` из группы `[Desktop Entry]`
fn read_icon_entry(path: &Path) -> Option<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("Ошибка чтения {:?}: {}", path, e);
            return None;
        }
    };

    let mut in_entry = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "Icon" {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}
