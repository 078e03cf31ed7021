//! Routerscope: SNMP-инвентаризация и замер загрузки CPU для небольшого парка
//! маршрутизаторов, плюс сопутствующие задачи лабораторной работы.
//!
//! - [`snmp`]: адаптер SNMPv2c с ленивым обходом, таймаутами и отменой
//! - [`collector`]: инвентаризация интерфейсов, опрос парка, ограниченный замер
//! - [`formatter`]: JSON-отчёты и SVG-графики
//! - [`capture`]: поиск MAC-адреса источника в pcap-файлах
//! - [`dhcp`]: настройка DHCP-пулов через ssh
//! - [`publish`]: отправка артефактов в git

pub mod capture;
pub mod collector;
pub mod config;
pub mod device;
pub mod dhcp;
pub mod formatter;
pub mod publish;
pub mod snmp;

pub use device::Device;
