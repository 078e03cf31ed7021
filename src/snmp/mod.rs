//! Протокольный адаптер: чтение скаляров и ленивый обход поддеревьев одного устройства.
//!
//! Каждая операция открывает свою сессию и ограничена таймаутом. Токен отмены
//! проверяется параллельно с запросом, повторов нет.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::device::Device;

pub mod device_profiles;
pub mod error;
pub mod oid;
pub mod transport;
pub mod v2c;
pub mod value;
pub mod walk;

pub use device_profiles::{DeviceDetector, Vendor};
pub use error::{ErrorStatus, ProtoError, TransportError};
pub use oid::{ObjectId, OidParseError, parse_oid};
pub use transport::{Session, Transport};
pub use v2c::{V2cSession, V2cTransport};
pub use value::SnmpValue;
pub use walk::Walk;

/// Таймаут одного запроса по умолчанию.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Размер страницы GETBULK при обходе по умолчанию.
pub const DEFAULT_MAX_REPETITIONS: u32 = 10;

/// Выполняет `fut` с таймаутом `timeout`, прерывается при срабатывании `cancel`.
pub(crate) async fn guarded<F, R>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<R, ProtoError>
where
    F: Future<Output = Result<R, ProtoError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtoError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(timeout).into()),
        },
    }
}

/// Операции из одного запроса поверх [`Transport`].
#[derive(Debug)]
pub struct SnmpAdapter<T> {
    transport: T,
    timeout: Duration,
    max_repetitions: u32,
}

impl<T: Transport> SnmpAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_repetitions(mut self, max_repetitions: u32) -> Self {
        self.max_repetitions = max_repetitions.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Один GET в отдельной сессии.
    pub async fn get(
        &self,
        device: &Device,
        oid: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<SnmpValue, ProtoError> {
        let exchange = async {
            let mut session = self.transport.open(device).await.map_err(ProtoError::from)?;
            session.get(oid).await
        };

        let outcome = guarded(self.timeout, cancel, exchange).await;
        if let Err(e) = &outcome {
            tracing::trace!(device = %device.name, %oid, error = %e, "GET failed");
        }
        outcome
    }

    /// Начинает обход поддерева `root`. Сессией владеет возвращённый [`Walk`];
    /// до первого вызова `next` запросы не отправляются.
    pub async fn walk(
        &self,
        device: &Device,
        root: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<Walk<T::Session>, ProtoError> {
        let open = async { self.transport.open(device).await.map_err(ProtoError::from) };
        let session = guarded(self.timeout, cancel, open).await?;

        Ok(Walk::new(
            session,
            root.clone(),
            self.max_repetitions,
            self.timeout,
            cancel.clone(),
        ))
    }
}
