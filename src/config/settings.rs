use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_INDEX_PROBE, DropPolicy, ProbeMode,
};
use crate::dhcp::{DhcpError, Ipv4Cidr};
use crate::snmp::{DEFAULT_MAX_REPETITIONS, DEFAULT_TIMEOUT, ObjectId};

/// Базовые настройки приложения. У каждого поля есть значение по умолчанию.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub auth: AuthSettings,
    pub inventory: InventorySettings,
    pub sampling: SamplingSettings,
    pub dhcp: DhcpSettings,
    pub publish: PublishSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Таймаут одного запроса.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Размер страницы GETBULK при обходе таблиц.
    pub max_repetitions: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Community SNMPv2c для устройств без своего.
    pub community: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            community: "public".to_string(),
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeModeSetting {
    #[default]
    Range,
    NameWalk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Исключающая верхняя граница перебора индексов.
    pub max_index_probe: u32,
    pub probe_mode: ProbeModeSetting,
    pub drop_policy: DropPolicy,
    /// Сколько устройств опрашивается одновременно.
    pub max_concurrency: usize,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            max_index_probe: DEFAULT_MAX_INDEX_PROBE,
            probe_mode: ProbeModeSetting::Range,
            drop_policy: DropPolicy::Strict,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl InventorySettings {
    pub fn probe_mode(&self) -> ProbeMode {
        match self.probe_mode {
            ProbeModeSetting::Range => ProbeMode::Range {
                max_index_probe: self.max_index_probe,
            },
            ProbeModeSetting::NameWalk => ProbeMode::NameWalk,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// OID для замера. Если не задан, берётся OID загрузки CPU производителя.
    pub oid: Option<ObjectId>,
    /// Каталог для графиков.
    pub output_dir: PathBuf,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(300),
            interval: Duration::from_secs(5),
            oid: None,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Настройка DHCP на маршрутизаторе через ssh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpSettings {
    /// Маршрутизатор, который раздаёт DHCP.
    pub router: Option<String>,
    pub user: Option<String>,
    pub jump_host: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub pool: String,
    pub registry: PathBuf,
    pub bindings_output: PathBuf,
}

impl Default for DhcpSettings {
    fn default() -> Self {
        Self {
            router: None,
            user: None,
            jump_host: None,
            timeout: Duration::from_secs(30),
            pool: "198.51.200.0/24".to_string(),
            registry: PathBuf::from("used_ips.json"),
            bindings_output: PathBuf::from("dhcp_clients.txt"),
        }
    }
}

impl DhcpSettings {
    pub fn pool(&self) -> Result<Ipv4Cidr, DhcpError> {
        self.pool.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub remote_url: Option<String>,
    pub branch: String,
    pub tree: PathBuf,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            branch: "main".to_string(),
            tree: PathBuf::from("."),
        }
    }
}
