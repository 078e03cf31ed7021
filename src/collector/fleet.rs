//! Инвентаризация по всему парку устройств.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::device_info::DeviceInfo;
use super::inventory::{InventoryResolver, ProbeMode, ResolveError};
use super::types::{Cancelled, DeviceFailure, DeviceInventory};
use crate::device::Device;
use crate::snmp::{ProtoError, Transport};

/// Сколько устройств опрашивается одновременно по умолчанию.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Результат прохода по парку. Каждое устройство попадает ровно в одну карту.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    pub devices: BTreeMap<String, DeviceInventory>,
    pub failures: BTreeMap<String, DeviceFailure>,
}

type DeviceOutcome = Result<Result<DeviceInventory, DeviceFailure>, Cancelled>;

/// Запускает инвентаризацию по многим устройствам, ошибки изолированы по устройству.
pub struct FleetOrchestrator<T> {
    resolver: Arc<InventoryResolver<T>>,
    mode: ProbeMode,
    max_concurrency: usize,
}

impl<T: Transport> FleetOrchestrator<T> {
    pub fn new(resolver: Arc<InventoryResolver<T>>) -> Self {
        Self {
            resolver,
            mode: ProbeMode::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Опрашивает все устройства. Сбойное устройство попадает в
    /// [`FleetReport::failures`]; проход прерывает только отмена, и перед выходом
    /// все задачи успевают закрыть свои сессии.
    ///
    /// Устройства с одинаковым именем не опрашиваются; имя попадает в ошибки один
    /// раз как [`DeviceFailure::DuplicateName`] со всеми его адресами.
    pub async fn resolve_fleet(
        &self,
        devices: &[Device],
        cancel: &CancellationToken,
    ) -> Result<FleetReport, Cancelled> {
        let mut report = FleetReport::default();
        let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for device in devices {
            by_name
                .entry(device.name.as_str())
                .or_default()
                .push(device.address.clone());
        }
        for (name, addresses) in by_name.iter().filter(|(_, a)| a.len() > 1) {
            tracing::warn!(device = %name, ?addresses, "duplicate device name, skipped");
            report
                .failures
                .insert(name.to_string(), DeviceFailure::DuplicateName(addresses.clone()));
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for device in devices.iter().filter(|d| by_name[d.name.as_str()].len() == 1) {
            let resolver = Arc::clone(&self.resolver);
            let limiter = Arc::clone(&limiter);
            let device = device.clone();
            let cancel = cancel.child_token();
            let mode = self.mode;

            tasks.spawn(async move {
                let outcome = async {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Cancelled),
                        permit = limiter.acquire_owned() => permit.map_err(|_| Cancelled)?,
                    };
                    resolve_device(&resolver, &device, mode, &cancel).await
                }
                .await;
                (device.name, outcome)
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    tracing::info!(devices = devices.len(), "fleet resolution cancelled");
                    return Err(Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((name, Ok(Ok(inventory))))) => {
                    tracing::info!(
                        device = %name,
                        vendor = %inventory.vendor,
                        interfaces = inventory.inventory.records.len(),
                        dropped = inventory.inventory.failures().count(),
                        "device resolved"
                    );
                    report.devices.insert(name, inventory);
                }
                Some(Ok((name, Ok(Err(failure))))) => {
                    tracing::warn!(device = %name, error = %failure, "device skipped");
                    report.failures.insert(name, failure);
                }
                // Сработал родительский токен, выходим на следующей итерации.
                Some(Ok((_, Err(Cancelled)))) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "device resolution task failed");
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        // Упавшая задача не может вернуть имя, учитываем её здесь.
        for device in devices {
            if !report.devices.contains_key(&device.name)
                && !report.failures.contains_key(&device.name)
            {
                report.failures.insert(
                    device.name.clone(),
                    DeviceFailure::Panicked("task terminated without a result".to_string()),
                );
            }
        }

        Ok(report)
    }
}

async fn resolve_device<T: Transport>(
    resolver: &InventoryResolver<T>,
    device: &Device,
    mode: ProbeMode,
    cancel: &CancellationToken,
) -> DeviceOutcome {
    let identity = match DeviceInfo::probe(resolver.adapter(), device, cancel).await {
        Ok(identity) => identity,
        Err(ProtoError::Cancelled) => return Err(Cancelled),
        Err(e) => return Ok(Err(DeviceFailure::Unreachable(e))),
    };

    match resolver.resolve_with(device, mode, cancel).await {
        Ok(inventory) => Ok(Ok(DeviceInventory {
            vendor: identity.vendor,
            sys_object_id: identity.sys_object_id,
            inventory,
        })),
        Err(ResolveError::Cancelled) => Err(Cancelled),
        Err(ResolveError::NameTable(e)) => Ok(Err(DeviceFailure::NameTable(e))),
    }
}
