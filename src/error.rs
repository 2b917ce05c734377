use crate::events::ToplevelId;
use std::io::ErrorKind;
use thiserror::Error;
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Композитор недоступен: {0}")]
    ConnectionUnavailable(String),

    #[error("Ошибка протокола Wayland: {0}")]
    ProtocolFault(String),

    #[error("Неизвестное окно: {0}")]
    UnknownHandle(ToplevelId),

    #[error("Seat не обнаружен, активация окна невозможна")]
    NoSeat,
}

impl PanelError {
    pub fn connection_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(PanelError::ConnectionUnavailable(msg.into()))
    }

    /// Ошибка, после которой соединение с композитором больше не используется
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            PanelError::ConnectionUnavailable(_) | PanelError::ProtocolFault(_) | PanelError::Io(_)
        )
    }
}

impl From<ConnectError> for PanelError {
    fn from(err: ConnectError) -> Self {
        PanelError::ConnectionUnavailable(err.to_string())
    }
}

impl From<WaylandError> for PanelError {
    fn from(err: WaylandError) -> Self {
        match err {
            WaylandError::Io(io) => match io.kind() {
                ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::UnexpectedEof => {
                    PanelError::ConnectionUnavailable(format!("соединение закрыто: {}", io))
                }
                _ => PanelError::ProtocolFault(io.to_string()),
            },
            WaylandError::Protocol(protocol) => PanelError::ProtocolFault(protocol.to_string()),
        }
    }
}

impl From<DispatchError> for PanelError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Backend(backend) => backend.into(),
            other => PanelError::ProtocolFault(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! panel_error {
    (connection_unavailable, $($arg:tt)*) => {
        $crate::error::PanelError::ConnectionUnavailable(format!($($arg)*))
    };
    (protocol_fault, $($arg:tt)*) => {
        $crate::error::PanelError::ProtocolFault(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wayland_io_errors_are_classified() {
        let eof = WaylandError::Io(std::io::Error::from(ErrorKind::BrokenPipe));
        assert!(matches!(PanelError::from(eof), PanelError::ConnectionUnavailable(_)));

        let other = WaylandError::Io(std::io::Error::from(ErrorKind::InvalidData));
        assert!(matches!(PanelError::from(other), PanelError::ProtocolFault(_)));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(panel_error!(protocol_fault, "bad opcode {}", 7).is_fatal_for_connection());
        assert!(panel_error!(connection_unavailable, "hang-up").is_fatal_for_connection());
        assert!(!PanelError::UnknownHandle(ToplevelId(1)).is_fatal_for_connection());
        assert!(!PanelError::NoSeat.is_fatal_for_connection());
    }
}
