//! Инвентаризация интерфейсов одного устройства.
//!
//! Имя, операционный статус, IPv4- и IPv6-адрес запрашиваются по отдельности
//! и связываются по индексу интерфейса. Интерфейс попадает в результат только
//! если все запросы успешны; остальное пишется в [`Inventory::dropped`] и в
//! лог на уровне debug.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::types::{
    Attribute, Cancelled, DroppedInterface, InterfaceRecord, Inventory, LookupError, OperStatus,
};
use crate::device::Device;
use crate::snmp::{ObjectId, ProtoError, SnmpAdapter, SnmpValue, Transport};

/// Исключающая верхняя граница перебора индексов по умолчанию (перебираем 1..=9).
pub const DEFAULT_MAX_INDEX_PROBE: u32 = 10;

/// Как ищутся индексы интерфейсов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// GET колонки имени для каждого индекса из `1..max_index_probe`.
    Range { max_index_probe: u32 },
    /// Один обход колонки имени, берём индексы из неё.
    NameWalk,
}

impl Default for ProbeMode {
    fn default() -> Self {
        Self::Range {
            max_index_probe: DEFAULT_MAX_INDEX_PROBE,
        }
    }
}

/// Что делать с интерфейсом, для которого не нашлось строки с адресом.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Отбросить интерфейс. Отбрасывается при любом сбойном или отсутствующем атрибуте.
    #[default]
    Strict,
    /// Выдать интерфейс без адреса. При ошибке запроса он всё равно отбрасывается.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    fn width(&self) -> usize {
        match self {
            Self::V4 => 4,
            Self::V6 => 16,
        }
    }
}

/// Как строка таблицы адресов связывается с индексом интерфейса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRule {
    /// Значение строки это индекс интерфейса, адрес в хвосте OID строки
    /// (ipAdEntIfIndex).
    ValueIsIndex,
    /// OID строки начинается с индекса интерфейса, за ним адрес
    /// (ipv6AddrTable, индекс ipv6IfIndex + ipv6AddrAddress).
    KeyLeadsWithIndex,
}

/// Колонка таблицы адресов и правило связывания.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    pub root: ObjectId,
    pub join: JoinRule,
    pub family: AddressFamily,
}

impl AddressTable {
    /// Октеты адреса строки, если она относится к интерфейсу `index`.
    fn match_row(&self, suffix: &[u64], value: &SnmpValue, index: u32) -> Option<Vec<u8>> {
        let width = self.family.width();
        let arcs = match self.join {
            JoinRule::ValueIsIndex => {
                if value.as_i64() != Some(i64::from(index)) || suffix.len() < width {
                    return None;
                }
                &suffix[suffix.len() - width..]
            }
            JoinRule::KeyLeadsWithIndex => {
                let (first, rest) = suffix.split_first()?;
                if *first != u64::from(index) {
                    return None;
                }
                match rest.len() {
                    n if n == width => rest,
                    // Индекс фиксированной длины, закодированный с префиксом длины.
                    n if n == width + 1 && rest[0] == width as u64 => &rest[1..],
                    _ => return None,
                }
            }
        };

        arcs.iter().map(|arc| u8::try_from(*arc).ok()).collect()
    }
}

/// Колонки, которые читает инвентаризация.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceTables {
    /// ifDescr
    pub name: ObjectId,
    /// ifOperStatus
    pub oper_status: ObjectId,
    pub ipv4: AddressTable,
    pub ipv6: AddressTable,
}

impl Default for InterfaceTables {
    fn default() -> Self {
        Self {
            name: ObjectId::new([1, 3, 6, 1, 2, 1, 2, 2, 1, 2]),
            oper_status: ObjectId::new([1, 3, 6, 1, 2, 1, 2, 2, 1, 8]),
            ipv4: AddressTable {
                // ipAdEntIfIndex
                root: ObjectId::new([1, 3, 6, 1, 2, 1, 4, 20, 1, 2]),
                join: JoinRule::ValueIsIndex,
                family: AddressFamily::V4,
            },
            ipv6: AddressTable {
                // ipv6AddrPfxLength
                root: ObjectId::new([1, 3, 6, 1, 2, 1, 55, 1, 8, 1, 2]),
                join: JoinRule::KeyLeadsWithIndex,
                family: AddressFamily::V6,
            },
        }
    }
}

/// Ошибка инвентаризации на уровне устройства.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cancelled")]
    Cancelled,

    /// Только в [`ProbeMode::NameWalk`]: без таблицы имён индексов нет.
    #[error("name table walk failed: {0}")]
    NameTable(ProtoError),
}

impl From<Cancelled> for ResolveError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

type Joined<T> = Result<Result<T, DroppedInterface>, Cancelled>;

pub struct InventoryResolver<T> {
    adapter: Arc<SnmpAdapter<T>>,
    tables: InterfaceTables,
    policy: DropPolicy,
}

impl<T: Transport> InventoryResolver<T> {
    pub fn new(adapter: Arc<SnmpAdapter<T>>) -> Self {
        Self {
            adapter,
            tables: InterfaceTables::default(),
            policy: DropPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DropPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tables(mut self, tables: InterfaceTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn adapter(&self) -> &SnmpAdapter<T> {
        &self.adapter
    }

    /// Перебирает индексы `1..max_index_probe`.
    pub async fn resolve(
        &self,
        device: &Device,
        max_index_probe: u32,
        cancel: &CancellationToken,
    ) -> Result<Inventory, ResolveError> {
        self.resolve_with(device, ProbeMode::Range { max_index_probe }, cancel)
            .await
    }

    pub async fn resolve_with(
        &self,
        device: &Device,
        mode: ProbeMode,
        cancel: &CancellationToken,
    ) -> Result<Inventory, ResolveError> {
        let mut inventory = Inventory::default();

        match mode {
            ProbeMode::Range { max_index_probe } => {
                for index in 1..max_index_probe {
                    let oid = self.tables.name.child(u64::from(index));
                    let outcome = match self.adapter.get(device, &oid, cancel).await {
                        Ok(name) => self.complete(device, index, &name, cancel).await?,
                        Err(ProtoError::Cancelled) => return Err(ResolveError::Cancelled),
                        Err(e) => Err(DroppedInterface::new(index, Attribute::Name, e)),
                    };
                    Self::record(device, &mut inventory, outcome);
                }
            }
            ProbeMode::NameWalk => {
                for (index, name) in self.name_table(device, cancel).await? {
                    let outcome = self.complete(device, index, &name, cancel).await?;
                    Self::record(device, &mut inventory, outcome);
                }
            }
        }

        inventory.records.sort_by_key(|r| r.index);
        Ok(inventory)
    }

    fn record(
        device: &Device,
        inventory: &mut Inventory,
        outcome: Result<InterfaceRecord, DroppedInterface>,
    ) {
        match outcome {
            Ok(record) => inventory.records.push(record),
            Err(dropped) => {
                if dropped.is_absent() {
                    tracing::trace!(device = %device.name, index = dropped.index, "no interface at index");
                } else {
                    tracing::debug!(
                        device = %device.name,
                        index = dropped.index,
                        attribute = %dropped.attribute,
                        error = %dropped.error,
                        "interface dropped"
                    );
                }
                inventory.dropped.push(dropped);
            }
        }
    }

    /// Один обход колонки имени; `(index, name)` по возрастанию индекса.
    async fn name_table(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> Result<Vec<(u32, SnmpValue)>, ResolveError> {
        let to_resolve = |e: ProtoError| match e {
            ProtoError::Cancelled => ResolveError::Cancelled,
            other => ResolveError::NameTable(other),
        };

        let walk = self
            .adapter
            .walk(device, &self.tables.name, cancel)
            .await
            .map_err(to_resolve)?;
        let rows = walk.collect().await.map_err(to_resolve)?;

        let mut names: Vec<(u32, SnmpValue)> = rows
            .into_iter()
            .filter_map(|(oid, value)| match oid.suffix_after(&self.tables.name)? {
                [index] => Some((u32::try_from(*index).ok()?, value)),
                _ => None,
            })
            .collect();
        names.sort_by_key(|(index, _)| *index);
        names.dedup_by_key(|(index, _)| *index);
        Ok(names)
    }

    /// Запросы статуса и адресов для индекса с найденным именем.
    async fn complete(
        &self,
        device: &Device,
        index: u32,
        name: &SnmpValue,
        cancel: &CancellationToken,
    ) -> Joined<InterfaceRecord> {
        let status_oid = self.tables.oper_status.child(u64::from(index));
        let oper_status = match self.adapter.get(device, &status_oid, cancel).await {
            Ok(value) => OperStatus::from_value(&value),
            Err(ProtoError::Cancelled) => return Err(Cancelled),
            Err(e) => return Ok(Err(DroppedInterface::new(index, Attribute::OperStatus, e))),
        };

        let ipv4 = match self
            .address(device, &self.tables.ipv4, Attribute::Ipv4, index, cancel)
            .await?
        {
            Ok(octets) => octets.and_then(|o| <[u8; 4]>::try_from(o).ok()).map(Ipv4Addr::from),
            Err(dropped) => return Ok(Err(dropped)),
        };

        let ipv6 = match self
            .address(device, &self.tables.ipv6, Attribute::Ipv6, index, cancel)
            .await?
        {
            Ok(octets) => octets.and_then(|o| <[u8; 16]>::try_from(o).ok()).map(Ipv6Addr::from),
            Err(dropped) => return Ok(Err(dropped)),
        };

        let name = name
            .as_text()
            .unwrap_or_else(|| name.to_string())
            .trim()
            .to_string();

        Ok(Ok(InterfaceRecord {
            index,
            name: (!name.is_empty()).then_some(name),
            oper_status,
            ipv4,
            ipv6,
        }))
    }

    /// Ищет в таблице адресов первую строку для `index`.
    async fn address(
        &self,
        device: &Device,
        table: &AddressTable,
        attribute: Attribute,
        index: u32,
        cancel: &CancellationToken,
    ) -> Joined<Option<Vec<u8>>> {
        let scan = async {
            let mut walk = self.adapter.walk(device, &table.root, cancel).await?;
            walk.find_map(|oid, value| table.match_row(oid.suffix_after(&table.root)?, value, index))
                .await
        };

        match scan.await {
            Ok(Some(octets)) => Ok(Ok(Some(octets))),
            Ok(None) => match self.policy {
                DropPolicy::Lenient => Ok(Ok(None)),
                DropPolicy::Strict => Ok(Err(DroppedInterface::new(
                    index,
                    attribute,
                    LookupError::NotFound {
                        table: table.root.clone(),
                        index,
                    },
                ))),
            },
            Err(ProtoError::Cancelled) => Err(Cancelled),
            Err(e) => Ok(Err(DroppedInterface::new(index, attribute, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_table() -> AddressTable {
        InterfaceTables::default().ipv4
    }

    fn ipv6_table() -> AddressTable {
        InterfaceTables::default().ipv6
    }

    #[test]
    fn test_ipv4_join_matches_on_value() {
        let table = ipv4_table();
        let suffix = [10, 0, 12, 1];
        assert_eq!(
            table.match_row(&suffix, &SnmpValue::Integer(3), 3),
            Some(vec![10, 0, 12, 1])
        );
        assert_eq!(table.match_row(&suffix, &SnmpValue::Integer(2), 3), None);
    }

    #[test]
    fn test_ipv6_join_matches_on_key() {
        let table = ipv6_table();
        let mut suffix = vec![2u64];
        suffix.extend([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let octets = table
            .match_row(&suffix, &SnmpValue::Integer(64), 2)
            .unwrap();
        assert_eq!(
            Ipv6Addr::from(<[u8; 16]>::try_from(octets).unwrap()),
            "2001:db8::1".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(table.match_row(&suffix, &SnmpValue::Integer(64), 3), None);
    }

    #[test]
    fn test_ipv6_join_accepts_length_prefix() {
        let table = ipv6_table();
        let mut suffix = vec![1u64, 16];
        suffix.extend([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(table.match_row(&suffix, &SnmpValue::Integer(64), 1).is_some());
    }

    #[test]
    fn test_join_rejects_out_of_range_arcs() {
        let table = ipv4_table();
        assert_eq!(
            table.match_row(&[10, 0, 300, 1], &SnmpValue::Integer(1), 1),
            None
        );
    }
}
