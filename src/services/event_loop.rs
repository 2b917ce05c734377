use super::backend::ProtocolBackend;
use super::shared_service::SharedWindowService;
use std::io;
use std::os::fd::OwnedFd;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{unix::AsyncFd, Interest};
use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Что сообщил источник готовности
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    HangUp,
    Error(String),
}

/// Источник готовности: сокет композитора или таймер эмулятора
pub enum ReadinessWatch {
    Fd(AsyncFd<OwnedFd>),
    Timer(Interval),
}

impl ReadinessWatch {
    pub fn for_fd(fd: OwnedFd) -> io::Result<Self> {
        // SAFETY: AsyncFd владеет OwnedFd, дескриптор открыт всё время жизни watch
        let fd = unsafe { AsyncFd::register_with_interest(fd, Interest::READABLE)? };
        Ok(ReadinessWatch::Fd(fd))
    }

    pub fn timer(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ReadinessWatch::Timer(interval)
    }

    /// Дождаться следующего события готовности
    pub async fn wait(&mut self) -> Readiness {
        match self {
            ReadinessWatch::Fd(fd) => match fd.readable().await {
                Ok(mut guard) => {
                    let hang_up = guard.ready().is_read_closed();
                    // Обработчик вычитает сокет до WouldBlock
                    guard.clear_ready();
                    if hang_up {
                        Readiness::HangUp
                    } else {
                        Readiness::Readable
                    }
                }
                Err(e) => Readiness::Error(e.to_string()),
            },
            ReadinessWatch::Timer(interval) => {
                interval.tick().await;
                Readiness::Readable
            }
        }
    }
}

/// Drives the window service from readiness events until hang-up or shutdown.
///
/// Runs on a single-threaded runtime inside a `LocalSet`; the service borrow
/// is taken only for the synchronous handling of one readiness event.
pub struct EventDispatchLoop<B: ProtocolBackend> {
    watch: ReadinessWatch,
    service: SharedWindowService<B>,
    shutdown: Rc<Notify>,
}

impl<B: ProtocolBackend> EventDispatchLoop<B> {
    pub fn new(
        watch: ReadinessWatch,
        service: SharedWindowService<B>,
        shutdown: Rc<Notify>,
    ) -> Self {
        Self {
            watch,
            service,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Цикл событий запущен");

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Получен запрос на остановку цикла событий");
                    self.service.with_mut(|s| s.shutdown());
                    break;
                }
                readiness = self.watch.wait() => {
                    debug!("Готовность: {:?}", readiness);
                    if self.service.with_mut(|s| s.handle_readiness(readiness)).is_break() {
                        break;
                    }
                }
            }
        }

        info!("Цикл событий остановлен");
    }
}
