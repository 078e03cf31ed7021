use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::snmp::{ObjectId, ProtoError, SnmpValue, Vendor};

/// Отмена по запросу вызывающего. Частичных результатов не бывает.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Операционный статус из ifOperStatus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperStatus {
    Up,
    Down,
    Unknown,
}

impl OperStatus {
    pub fn from_value(value: &SnmpValue) -> Self {
        match value.as_i64() {
            Some(1) => Self::Up,
            // down(2), lowerLayerDown(7)
            Some(2) | Some(7) => Self::Down,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for OperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        })
    }
}

/// Полностью собранный интерфейс.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    pub index: u32,
    pub name: Option<String>,
    pub oper_status: OperStatus,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Четыре запроса по интерфейсу, связанные по индексу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Name,
    OperStatus,
    Ipv4,
    Ipv6,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::OperStatus => "oper_status",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        })
    }
}

/// Почему запрос атрибута ничего не дал.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// Обход таблицы закончился, строки для интерфейса нет.
    #[error("no row under {table} references interface {index}")]
    NotFound { table: ObjectId, index: u32 },
}

/// Неполные данные: индекс интерфейса, не попавший в инвентаризацию, и
/// запрос, из-за которого это случилось.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interface {index} dropped: {attribute} lookup failed: {error}")]
pub struct DroppedInterface {
    pub index: u32,
    pub attribute: Attribute,
    pub error: LookupError,
}

impl DroppedInterface {
    pub fn new(index: u32, attribute: Attribute, error: impl Into<LookupError>) -> Self {
        Self {
            index,
            attribute,
            error: error.into(),
        }
    }

    /// Агент ответил, что интерфейса нет, это не ошибка.
    pub fn is_absent(&self) -> bool {
        matches!(
            (&self.attribute, &self.error),
            (Attribute::Name, LookupError::Proto(ProtoError::Protocol { status, .. }))
                if status.is_absence()
        )
    }
}

/// Интерфейсы одного устройства и всё, что было отброшено.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// По возрастанию индекса.
    pub records: Vec<InterfaceRecord>,
    pub dropped: Vec<DroppedInterface>,
}

impl Inventory {
    /// Отброшенные из-за ошибок, без несуществующих индексов.
    pub fn failures(&self) -> impl Iterator<Item = &DroppedInterface> {
        self.dropped.iter().filter(|d| !d.is_absent())
    }
}

/// Почему устройство целиком выпало из прохода по парку.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceFailure {
    #[error("device unreachable: {0}")]
    Unreachable(ProtoError),

    #[error("interface name table walk failed: {0}")]
    NameTable(ProtoError),

    #[error("resolution task aborted: {0}")]
    Panicked(String),

    #[error("name shared by several devices: {}", .0.join(", "))]
    DuplicateName(Vec<String>),
}

/// Инвентаризация устройства вместе с данными предварительной проверки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInventory {
    pub vendor: Vendor,
    pub sys_object_id: Option<ObjectId>,
    pub inventory: Inventory,
}

/// Один тик замера.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Секунды от начала замера.
    pub offset_seconds: f64,
    pub value: Option<SnmpValue>,
    pub error: Option<ProtoError>,
}

impl Sample {
    pub fn ok(offset_seconds: f64, value: SnmpValue) -> Self {
        Self {
            offset_seconds,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(offset_seconds: f64, error: ProtoError) -> Self {
        Self {
            offset_seconds,
            value: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Завершённый неизменяемый временной ряд одного замера.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    device: String,
    oid: ObjectId,
    started_at: DateTime<Utc>,
    duration: Duration,
    interval: Duration,
    samples: Vec<Sample>,
}

impl Series {
    pub fn new(
        device: impl Into<String>,
        oid: ObjectId,
        started_at: DateTime<Utc>,
        duration: Duration,
        interval: Duration,
        samples: Vec<Sample>,
    ) -> Self {
        Self {
            device: device.into(),
            oid,
            started_at,
            duration,
            interval,
            samples,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(offset, value)` для каждого сэмпла с числовым значением.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples
            .iter()
            .filter_map(|s| Some((s.offset_seconds, s.value.as_ref()?.as_f64()?)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| !s.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::ErrorStatus;

    #[test]
    fn test_oper_status_mapping() {
        assert_eq!(OperStatus::from_value(&SnmpValue::Integer(1)), OperStatus::Up);
        assert_eq!(OperStatus::from_value(&SnmpValue::Integer(2)), OperStatus::Down);
        assert_eq!(OperStatus::from_value(&SnmpValue::Integer(7)), OperStatus::Down);
        assert_eq!(OperStatus::from_value(&SnmpValue::Integer(5)), OperStatus::Unknown);
        assert_eq!(OperStatus::from_value(&SnmpValue::Null), OperStatus::Unknown);
    }

    #[test]
    fn test_dropped_absent_vs_failure() {
        let absent = DroppedInterface::new(
            4,
            Attribute::Name,
            ProtoError::protocol(ErrorStatus::NoSuchInstance, 1),
        );
        assert!(absent.is_absent());

        let refused = DroppedInterface::new(
            4,
            Attribute::Name,
            ProtoError::protocol(ErrorStatus::GenErr, 1),
        );
        assert!(!refused.is_absent());

        let inventory = Inventory {
            records: Vec::new(),
            dropped: vec![absent, refused.clone()],
        };
        assert_eq!(inventory.failures().collect::<Vec<_>>(), vec![&refused]);
    }

    #[test]
    fn test_series_points_skip_failures() {
        let series = Series::new(
            "R1",
            ObjectId::new([1, 3, 6]),
            Utc::now(),
            Duration::from_secs(10),
            Duration::from_secs(2),
            vec![
                Sample::ok(0.0, SnmpValue::Integer(5)),
                Sample::failed(2.0, ProtoError::Cancelled),
                Sample::ok(4.0, SnmpValue::Integer(9)),
            ],
        );
        assert_eq!(series.points().collect::<Vec<_>>(), vec![(0.0, 5.0), (4.0, 9.0)]);
        assert_eq!(series.failures().count(), 1);
    }
}
