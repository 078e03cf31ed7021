use async_trait::async_trait;

use super::error::{ProtoError, TransportError};
use super::oid::ObjectId;
use super::value::SnmpValue;
use crate::device::Device;

/// Открывает сессии к устройствам.
///
/// Сессией владеет ровно одна операция, освобождается она через drop, поэтому
/// закрывается на любом пути выхода: успех, ошибка, таймаут, отмена.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    async fn open(&self, device: &Device) -> Result<Self::Session, TransportError>;
}

/// Открытая сессия с агентом.
#[async_trait]
pub trait Session: Send + 'static {
    /// Один GET. Исключения в varbind и ненулевой error-status возвращаются как
    /// [`ProtoError::Protocol`].
    async fn get(&mut self, oid: &ObjectId) -> Result<SnmpValue, ProtoError>;

    /// До `max_repetitions` следующих за `oid` значений, обрезано на первом
    /// `endOfMibView`.
    async fn get_bulk(
        &mut self,
        oid: &ObjectId,
        max_repetitions: u32,
    ) -> Result<Vec<(ObjectId, SnmpValue)>, ProtoError>;
}
