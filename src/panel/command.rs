use crate::events::ToplevelId;
use anyhow::{anyhow, bail, Context, Result};
use std::str::FromStr;

/// Текстовая команда панели, читается построчно из stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    /// Окна реестра, опционально отфильтрованные по подстроке заголовка/app_id
    List(Option<String>),
    /// Отрисовать панель задач
    Tasks,
    Activate(ToplevelId),
    Minimize(ToplevelId),
    Click(ToplevelId),
    ToggleDesktop,
    MinimizeAll,
    RestoreAll,
    Help,
    Quit,
}

pub const HELP: &str = "\
Команды:
  list [фильтр]     окна реестра
  tasks             панель задач
  activate <id>     активировать окно
  minimize <id>     свернуть окно
  click <id>        клик по кнопке окна
  toggle-desktop    показать рабочий стол / восстановить окна
  minimize-all      свернуть все окна
  restore-all       восстановить окна
  help              эта справка
  quit              выход";

impl FromStr for PanelCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| anyhow!("Пустая команда"))?;
        let rest: Vec<&str> = parts.collect();

        let command = match name {
            "list" => {
                let filter = (!rest.is_empty()).then(|| rest.join(" "));
                return Ok(PanelCommand::List(filter));
            }
            "tasks" => PanelCommand::Tasks,
            "activate" => PanelCommand::Activate(parse_id(name, &rest)?),
            "minimize" => PanelCommand::Minimize(parse_id(name, &rest)?),
            "click" => PanelCommand::Click(parse_id(name, &rest)?),
            "toggle-desktop" => PanelCommand::ToggleDesktop,
            "minimize-all" => PanelCommand::MinimizeAll,
            "restore-all" => PanelCommand::RestoreAll,
            "help" | "?" => PanelCommand::Help,
            "quit" | "exit" => PanelCommand::Quit,
            other => bail!("Неизвестная команда: {}", other),
        };

        if !rest.is_empty() && !matches!(command, PanelCommand::Activate(_) | PanelCommand::Minimize(_) | PanelCommand::Click(_)) {
            bail!("Команда {} не принимает аргументов", name);
        }
        Ok(command)
    }
}

fn parse_id(command: &str, args: &[&str]) -> Result<ToplevelId> {
    match args {
        [id] => id
            .parse()
            .with_context(|| format!("Неверный id окна: {}", id)),
        _ => bail!("Использование: {} <id>", command),
    }
}
