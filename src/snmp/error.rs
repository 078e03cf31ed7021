//! Типы результатов протокольных операций.
//!
//! Вызывающий код смотрит на вариант [`ProtoError`], а не на текст сообщения:
//! устройство недоступно ([`ProtoError::Transport`]), устройство ответило
//! отказом ([`ProtoError::Protocol`]) или операцию отменили
//! ([`ProtoError::Cancelled`]).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Сетевая ошибка. Пригодного ответа от устройства не было.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Не удалось создать сокет или разрешить адрес.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Ошибка отправки/приёма или ответ не относится к запросу.
    #[error("request failed: {0}")]
    Request(String),

    /// Нет ответа за отведённый таймаут.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Ответ не удалось преобразовать в собственное значение.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Статус ошибки из корректного PDU ответа (RFC 3416), а также исключения
/// в varbind, которыми SNMPv2c заменяет `noSuchName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Unknown(u32),
}

impl ErrorStatus {
    /// Разбирает ненулевое поле `error-status`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Агент сообщает, что по этому OID ничего нет, а не об ошибке.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::NoSuchName | Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TooBig => "tooBig",
            Self::NoSuchName => "noSuchName",
            Self::BadValue => "badValue",
            Self::ReadOnly => "readOnly",
            Self::GenErr => "genErr",
            Self::NoAccess => "noAccess",
            Self::WrongType => "wrongType",
            Self::WrongLength => "wrongLength",
            Self::WrongEncoding => "wrongEncoding",
            Self::WrongValue => "wrongValue",
            Self::NoCreation => "noCreation",
            Self::InconsistentValue => "inconsistentValue",
            Self::ResourceUnavailable => "resourceUnavailable",
            Self::CommitFailed => "commitFailed",
            Self::UndoFailed => "undoFailed",
            Self::AuthorizationError => "authorizationError",
            Self::NotWritable => "notWritable",
            Self::InconsistentName => "inconsistentName",
            Self::NoSuchObject => "noSuchObject",
            Self::NoSuchInstance => "noSuchInstance",
            Self::EndOfMibView => "endOfMibView",
            Self::Unknown(code) => return write!(f, "status({code})"),
        };
        f.write_str(name)
    }
}

/// Итог операции адаптера, не вернувшей значение.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Устройство доступно, но отклонило запрос.
    #[error("protocol error: {status} at index {index}")]
    Protocol { status: ErrorStatus, index: u32 },

    #[error("cancelled")]
    Cancelled,
}

impl ProtoError {
    pub fn protocol(status: ErrorStatus, index: u32) -> Self {
        Self::Protocol { status, index }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Короткий код вида ошибки для JSON-вывода.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::Timeout(_)) => "timeout",
            Self::Transport(_) => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Cancelled => "cancelled",
        }
    }
}
