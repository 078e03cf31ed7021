use std::fmt;

use serde::{Deserialize, Serialize};

/// Порт SNMP-агента по умолчанию.
pub const DEFAULT_SNMP_PORT: u16 = 161;

fn default_port() -> u16 {
    DEFAULT_SNMP_PORT
}

/// Управляемый маршрутизатор. Не меняется во время прохода.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Имя устройства, оно же ключ в результатах по парку.
    pub name: String,
    /// Имя хоста или IP-адрес агента.
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Community SNMPv2c. Берётся из настроек, если не указано в файле.
    #[serde(default)]
    pub community: String,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        community: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: DEFAULT_SNMP_PORT,
            community: community.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Строка `host:port` для UDP-транспорта. IPv6-адреса берутся в скобки.
    pub fn target(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

// Community это пароль, в логи не пишем.
impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.target())
    }
}
