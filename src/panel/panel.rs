use super::command::{PanelCommand, HELP};
use super::r#trait::PanelTrait;
use crate::config::Config;
use crate::error::{PanelError, Result};
use crate::events::{ToplevelId, ToplevelSnapshot};
use crate::services::backend::ProtocolBackend;
use crate::services::{
    EventDispatchLoop, ReadinessWatch, SharedWindowService, ShowDesktop, TasklistView, WindowService,
};
use crate::utils::DesktopEntryIconResolver;
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Сервис окон и подписанные на него потребители
struct Controls<B: ProtocolBackend> {
    service: SharedWindowService<B>,
    tasklist: Option<Rc<RefCell<TasklistView>>>,
    show_desktop: Option<Rc<ShowDesktop>>,
}

/// Headless panel: tasklist and show-desktop consumers driven from stdin
pub struct Panel<B: ProtocolBackend> {
    controls: Controls<B>,
    watch: ReadinessWatch,
}

impl<B: ProtocolBackend + 'static> Panel<B> {
    pub fn new(config: &Config, backend: B, watch: ReadinessWatch) -> Result<Self> {
        let mut service = WindowService::new(backend, config.show_desktop.restore_policy);
        // Начальное перечисление уходит в снимок, подписчиков ещё нет
        service.dispatch_pending()?;
        service.take_changes();
        let records = service.list_records();
        let service = SharedWindowService::new(service);

        let tasklist = config.tasklist.enable.then(|| {
            let icons = DesktopEntryIconResolver::new(
                &config.tasklist.desktop_dirs,
                &config.tasklist.fallback_icon,
            );
            let mut view = TasklistView::new(&config.tasklist, Box::new(icons));
            view.populate(&records);

            let view = Rc::new(RefCell::new(view));
            let sink = view.clone();
            service.subscribe(move |change| sink.borrow_mut().apply(change));
            view
        });

        let show_desktop = config.show_desktop.enable.then(|| {
            let button = Rc::new(ShowDesktop::new());
            let sink = button.clone();
            service.subscribe(move |change| sink.apply(change));
            button
        });

        info!(
            "Панель готова: окон {}, панель задач: {}, рабочий стол: {}",
            records.len(),
            tasklist.is_some(),
            show_desktop.is_some()
        );

        Ok(Self {
            controls: Controls {
                service,
                tasklist,
                show_desktop,
            },
            watch,
        })
    }
}

impl<B: ProtocolBackend> Controls<B> {
    fn list(&self) -> Vec<ToplevelSnapshot> {
        self.service.list_records()
    }

    fn execute(&self, command: PanelCommand) -> ControlFlow<()> {
        match command {
            PanelCommand::List(filter) => {
                let pattern = filter.unwrap_or_default();
                for record in self.list().iter().filter(|r| r.matches_pattern(&pattern)) {
                    println!("{}", record);
                }
            }
            PanelCommand::Tasks => match &self.tasklist {
                Some(view) => print!("{}", view.borrow().render()),
                None => println!("Панель задач отключена"),
            },
            PanelCommand::Activate(id) => {
                let result = self.service.with_mut(|s| s.activate(id));
                report("activate", result);
            }
            PanelCommand::Minimize(id) => {
                let result = self.service.with_mut(|s| s.minimize(id));
                report("minimize", result);
            }
            PanelCommand::Click(id) => report("click", self.click(id)),
            PanelCommand::ToggleDesktop => match &self.show_desktop {
                Some(button) => {
                    let result = self.service.with_mut(|s| button.toggle(s));
                    report("toggle-desktop", result.map(|action| println!("{:?}", action)));
                }
                None => println!("Кнопка «Показать рабочий стол» отключена"),
            },
            PanelCommand::MinimizeAll => {
                let result = self.service.with_mut(|s| s.minimize_all());
                report("minimize-all", result.map(|sent| println!("запросов: {}", sent)));
            }
            PanelCommand::RestoreAll => {
                let result = self.service.with_mut(|s| s.restore_all());
                report("restore-all", result.map(|sent| println!("запросов: {}", sent)));
            }
            PanelCommand::Help => println!("{}", HELP),
            PanelCommand::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn click(&self, id: ToplevelId) -> Result<()> {
        let Some(view) = &self.tasklist else {
            return Err(PanelError::UnknownHandle(id));
        };
        // Заимствование представления отпускаем до отправки команды
        let action = view.borrow().click_action(id);
        let action = action.ok_or(PanelError::UnknownHandle(id))?;
        self.service.with_mut(|s| action.perform(s, id))
    }
}

fn report(command: &str, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_fatal_for_connection() => error!("{}: {}", command, e),
        Err(e) => warn!("{}: {}", command, e),
    }
}

#[async_trait::async_trait(?Send)]
impl<B: ProtocolBackend + 'static> PanelTrait for Panel<B> {
    fn list(&self) -> Vec<ToplevelSnapshot> {
        self.controls.list()
    }

    async fn run(self: Box<Self>) -> Result<()> {
        let Panel { controls, watch } = *self;

        let shutdown = Rc::new(Notify::new());
        let mut event_loop = tokio::task::spawn_local(
            EventDispatchLoop::new(watch, controls.service.clone(), shutdown.clone()).run(),
        );

        info!("Панель запущена, команды читаются из stdin (help - справка)");
        let _ = controls.execute(PanelCommand::Tasks);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut loop_finished = false;

        loop {
            tokio::select! {
                result = signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
                    }
                    break;
                }
                _ = &mut event_loop => {
                    loop_finished = true;
                    break;
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<PanelCommand>() {
                            Ok(command) => {
                                if controls.execute(command).is_break() {
                                    break;
                                }
                            }
                            Err(e) => warn!("{:#}", e),
                        }
                    }
                    Ok(None) => {
                        info!("stdin закрыт, ожидаем Ctrl+C");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Ошибка чтения stdin: {}", e);
                        stdin_open = false;
                    }
                },
            }
        }

        if loop_finished {
            return PanelError::connection_unavailable("соединение с композитором потеряно");
        }

        info!("Завершение работы...");
        shutdown.notify_one();

        let shutdown_timeout = Duration::from_secs(5);
        match tokio::time::timeout(shutdown_timeout, &mut event_loop).await {
            Ok(_) => info!("Цикл событий завершил работу корректно"),
            Err(_) => warn!("Таймаут при завершении цикла событий"),
        }

        Ok(())
    }
}
