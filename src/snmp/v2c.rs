use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};

use super::error::{ErrorStatus, ProtoError, TransportError};
use super::oid::ObjectId;
use super::transport::{Session, Transport};
use super::value::SnmpValue;
use crate::device::Device;

/// SNMPv2c поверх UDP.
#[derive(Debug)]
pub struct V2cTransport {
    next_request_id: AtomicI32,
}

impl V2cTransport {
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicI32::new(1),
        }
    }
}

impl Default for V2cTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for V2cTransport {
    type Session = V2cSession;

    async fn open(&self, device: &Device) -> Result<V2cSession, TransportError> {
        // Разные начальные id для каждой сессии, чтобы запоздавший ответ на
        // брошенный запрос не приняли за новый.
        let req_id = self.next_request_id.fetch_add(1000, Ordering::Relaxed) & i32::MAX;

        let session = AsyncSession::new_v2c(device.target(), device.community.as_bytes(), req_id)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", device.target())))?;

        tracing::trace!(device = %device.name, target = %device.target(), "SNMP session opened");
        Ok(V2cSession { session })
    }
}

pub struct V2cSession {
    session: AsyncSession,
}

#[async_trait]
impl Session for V2cSession {
    async fn get(&mut self, oid: &ObjectId) -> Result<SnmpValue, ProtoError> {
        let wire_oid = to_wire(oid)?;
        let resp = self
            .session
            .get(&wire_oid)
            .await
            .map_err(|e| TransportError::Request(format!("GET {oid}: {e}")))?;

        check_status(resp.error_status, resp.error_index)?;
        single_value(resp.varbinds)
    }

    async fn get_bulk(
        &mut self,
        oid: &ObjectId,
        max_repetitions: u32,
    ) -> Result<Vec<(ObjectId, SnmpValue)>, ProtoError> {
        let wire_oid = to_wire(oid)?;
        let resp = self
            .session
            .getbulk(&[&wire_oid], 0, max_repetitions)
            .await
            .map_err(|e| TransportError::Request(format!("GETBULK {oid}: {e}")))?;

        check_status(resp.error_status, resp.error_index)?;
        bulk_rows(resp.varbinds)
    }
}

fn check_status(error_status: u32, error_index: u32) -> Result<(), ProtoError> {
    if error_status == 0 {
        Ok(())
    } else {
        Err(ProtoError::protocol(
            ErrorStatus::from_code(error_status),
            error_index,
        ))
    }
}

/// Значение из ответа на GET; исключения в varbind становятся протокольными ошибками.
fn single_value<'a>(
    varbinds: impl IntoIterator<Item = (Oid<'a>, Value<'a>)>,
) -> Result<SnmpValue, ProtoError> {
    let (_, value) = varbinds
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Decode("empty varbind list".to_string()))?;
    convert_value(value, 1)
}

/// Строки страницы GETBULK до первого исключения в varbind.
fn bulk_rows<'a>(
    varbinds: impl IntoIterator<Item = (Oid<'a>, Value<'a>)>,
) -> Result<Vec<(ObjectId, SnmpValue)>, ProtoError> {
    let mut rows = Vec::new();
    for (position, (row_oid, value)) in varbinds.into_iter().enumerate() {
        if matches!(
            value,
            Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance
        ) {
            break;
        }
        let index = u32::try_from(position + 1).unwrap_or(u32::MAX);
        rows.push((from_wire(&row_oid)?, convert_value(value, index)?));
    }
    Ok(rows)
}

fn to_wire(oid: &ObjectId) -> Result<Oid<'static>, ProtoError> {
    Oid::from(oid.arcs())
        .map_err(|e| TransportError::Request(format!("cannot encode OID {oid}: {e:?}")).into())
}

fn from_wire(oid: &Oid<'_>) -> Result<ObjectId, ProtoError> {
    oid.to_string()
        .parse()
        .map_err(|e| TransportError::Decode(format!("{e}")).into())
}

fn convert_value(value: Value<'_>, index: u32) -> Result<SnmpValue, ProtoError> {
    let converted = match value {
        Value::Boolean(v) => SnmpValue::Boolean(v),
        Value::Null => SnmpValue::Null,
        Value::Integer(v) => SnmpValue::Integer(v),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::ObjectIdentifier(oid) => SnmpValue::ObjectId(from_wire(&oid)?),
        Value::IpAddress(octets) => SnmpValue::IpAddress(Ipv4Addr::from(octets)),
        Value::Counter32(v) => SnmpValue::Counter32(v),
        Value::Unsigned32(v) => SnmpValue::Unsigned32(v),
        Value::Timeticks(v) => SnmpValue::Timeticks(v),
        Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        Value::Counter64(v) => SnmpValue::Counter64(v),
        Value::NoSuchObject => return Err(ProtoError::protocol(ErrorStatus::NoSuchObject, index)),
        Value::NoSuchInstance => {
            return Err(ProtoError::protocol(ErrorStatus::NoSuchInstance, index));
        }
        Value::EndOfMibView => return Err(ProtoError::protocol(ErrorStatus::EndOfMibView, index)),
        other => SnmpValue::Other(format!("{other:?}")),
    };
    Ok(converted)
}
