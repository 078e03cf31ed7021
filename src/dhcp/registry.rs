use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use super::{DhcpError, Ipv4Cidr};
use crate::capture::MacAddr;

/// Сохранённые привязки MAC к IPv4 в виде JSON-объекта.
#[derive(Debug, Clone)]
pub struct LeaseRegistry {
    path: PathBuf,
    leases: BTreeMap<MacAddr, Ipv4Addr>,
}

impl LeaseRegistry {
    /// Открывает реестр. Нет файла значит пустой реестр.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DhcpError> {
        let path = path.into();
        let leases = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                DhcpError::RegistryFormat {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(DhcpError::Io { path, source }),
        };
        Ok(Self { path, leases })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, mac: &MacAddr) -> Option<Ipv4Addr> {
        self.leases.get(mac).copied()
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn save(&self) -> Result<(), DhcpError> {
        let content = serde_json::to_string_pretty(&self.leases).map_err(|source| {
            DhcpError::RegistryFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, content).map_err(|source| DhcpError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Возвращает существующую аренду для `mac` или выдаёт и сохраняет первый
    /// свободный хост из `pool`. Шлюз не выдаётся, аренда вне `pool` заменяется.
    pub fn allocate(&mut self, mac: MacAddr, pool: &Ipv4Cidr) -> Result<Ipv4Addr, DhcpError> {
        let gateway = pool.gateway();
        match self.get(&mac) {
            Some(ip) if pool.contains(ip) && Some(ip) != gateway => {
                tracing::debug!(%mac, %ip, "existing lease reused");
                return Ok(ip);
            }
            Some(stale) => tracing::warn!(%mac, %stale, %pool, "lease outside pool, reassigning"),
            None => {}
        }

        let used: HashSet<Ipv4Addr> = self
            .leases
            .iter()
            .filter(|(leased, _)| **leased != mac)
            .map(|(_, ip)| *ip)
            .collect();
        let ip = pool
            .hosts()
            .find(|ip| Some(*ip) != gateway && !used.contains(ip))
            .ok_or(DhcpError::PoolExhausted(*pool))?;

        self.leases.insert(mac, ip);
        self.save()?;
        tracing::info!(%mac, %ip, "lease allocated");
        Ok(ip)
    }
}
