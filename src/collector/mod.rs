//! Коллекторы поверх протокольного адаптера.
//!
//! - [`InventoryResolver`]: интерфейсы одного устройства
//! - [`FleetOrchestrator`]: инвентаризация по многим устройствам, ошибки изолированы
//! - [`BoundedSampler`]: замер одного скаляра с фиксированным шагом до дедлайна
//!
//! Ошибка одного элемента не прерывает цикл: сбойный интерфейс отбрасывается,
//! про сбойное устройство сообщается, сбойный тик становится сэмплом с ошибкой.

mod device_info;
mod fleet;
mod inventory;
mod sampler;
mod types;

pub use device_info::{DeviceIdentity, DeviceInfo};
pub use fleet::{DEFAULT_MAX_CONCURRENCY, FleetOrchestrator, FleetReport};
pub use inventory::{
    AddressFamily, AddressTable, DEFAULT_MAX_INDEX_PROBE, DropPolicy, InterfaceTables,
    InventoryResolver, JoinRule, ProbeMode, ResolveError,
};
pub use sampler::{BoundedSampler, MIN_INTERVAL};
pub use types::{
    Attribute, Cancelled, DeviceFailure, DeviceInventory, DroppedInterface, InterfaceRecord,
    Inventory, LookupError, OperStatus, Sample, Series,
};
