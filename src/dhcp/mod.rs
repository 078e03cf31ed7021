//! Настройка DHCP-пулов на маршрутизаторах IOS через удалённую консоль.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::capture::MacAddr;

pub mod registry;
pub mod shell;

pub use registry::LeaseRegistry;
pub use shell::{RemoteShell, SshShell};

#[derive(Debug, Error)]
pub enum DhcpError {
    #[error("failed to run ssh: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("remote command on {host} failed (exit {code:?}): {stderr}")]
    Remote {
        host: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed lease registry {path}: {source}")]
    RegistryFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no free address left in {0}")]
    PoolExhausted(Ipv4Cidr),

    #[error("invalid IPv4 network '{0}'")]
    InvalidCidr(String),
}

/// IPv4-сеть в виде `a.b.c.d/len`. Биты хоста должны быть нулевыми.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, DhcpError> {
        let cidr = Self { network, prefix };
        if prefix > 32 || u32::from(network) & !cidr.mask_bits() != 0 {
            return Err(DhcpError::InvalidCidr(format!("{network}/{prefix}")));
        }
        Ok(cidr)
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn mask_bits(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix))
        }
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask_bits())
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !self.mask_bits())
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask_bits() == u32::from(self.network)
    }

    /// Адреса хостов. У /31 и /32 нет адреса сети и широковещательного адреса,
    /// исключать нечего.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let first = u32::from(self.network);
        let last = u32::from(self.broadcast());
        let (start, end) = if self.prefix >= 31 {
            (first, last)
        } else {
            (first + 1, last - 1)
        };
        (start..=end).map(Ipv4Addr::from)
    }

    /// Шлюз по умолчанию для клиентов: первый хост.
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.hosts().next()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = DhcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DhcpError::InvalidCidr(s.to_string());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let network: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        Self::new(network, prefix).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Закрепить адрес за клиентом.
    Static,
    /// Выдать клиенту адрес из общего динамического пула.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    Static(Ipv4Addr),
    Dynamic(String),
}

impl fmt::Display for BindingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingOutcome::Static(ip) => write!(f, "static address {ip}"),
            BindingOutcome::Dynamic(note) => f.write_str(note),
        }
    }
}

fn wrap_config(lines: &[String]) -> String {
    let mut script = String::from("configure terminal\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str("end\nwrite memory\n");
    script
}

/// Пул ручной привязки для одного клиента.
pub fn static_binding_script(mac: &MacAddr, ip: Ipv4Addr, pool: &Ipv4Cidr) -> String {
    let mut lines = vec![
        format!("ip dhcp pool static_{}", mac.compact()),
        format!("host {ip} {}", pool.netmask()),
        format!("client-identifier {}", mac.client_identifier()),
    ];
    if let Some(gw) = pool.gateway() {
        lines.push(format!("default-router {gw}"));
    }
    wrap_config(&lines)
}

pub fn dynamic_pool_script(pool: &Ipv4Cidr) -> String {
    let mut lines = vec![
        "ip dhcp pool dynamic".to_string(),
        format!("network {} {}", pool.network(), pool.netmask()),
    ];
    if let Some(gw) = pool.gateway() {
        lines.push(format!("default-router {gw}"));
    }
    wrap_config(&lines)
}

/// Настраивает DHCP для `mac` и сохраняет running config.
///
/// Статическая привязка берёт адрес из реестра, реестр обновляется до
/// обращения к маршрутизатору.
pub async fn configure_binding<S>(
    shell: &S,
    registry: &mut LeaseRegistry,
    mac: MacAddr,
    mode: BindingMode,
    pool: &Ipv4Cidr,
) -> Result<BindingOutcome, DhcpError>
where
    S: RemoteShell + ?Sized,
{
    match mode {
        BindingMode::Static => {
            let ip = registry.allocate(mac, pool)?;
            shell.exec(&static_binding_script(&mac, ip, pool)).await?;
            tracing::info!(%mac, %ip, "static binding configured");
            Ok(BindingOutcome::Static(ip))
        }
        BindingMode::Dynamic => {
            shell.exec(&dynamic_pool_script(pool)).await?;
            tracing::info!(%mac, %pool, "dynamic pool configured");
            Ok(BindingOutcome::Dynamic(format!(
                "dynamic DHCP configured for {mac} on {pool}"
            )))
        }
    }
}

/// Сохраняет вывод `show ip dhcp binding` с заголовком и временем.
pub async fn fetch_binding_table<S>(shell: &S, path: &Path) -> Result<String, DhcpError>
where
    S: RemoteShell + ?Sized,
{
    let output = shell.exec("show ip dhcp binding\n").await?;
    let report = format!(
        "DHCP Clients - Retrieved at {}\n{}\n\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(50),
        output
    );
    tokio::fs::write(path, &report)
        .await
        .map_err(|source| DhcpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), "binding table saved");
    Ok(report)
}

/// Первый IPv6-адрес из таблицы соседей на `interface`.
pub async fn find_ipv6_neighbor<S>(
    shell: &S,
    interface: &str,
) -> Result<Option<Ipv6Addr>, DhcpError>
where
    S: RemoteShell + ?Sized,
{
    let output = shell.exec("show ipv6 neighbors\n").await?;
    Ok(parse_ipv6_neighbors(&output, interface))
}

/// Разбирает `show ipv6 neighbors`: адрес в начале строки, интерфейс в
/// одной из колонок.
pub fn parse_ipv6_neighbors(output: &str, interface: &str) -> Option<Ipv6Addr> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let addr = fields.next()?.parse::<Ipv6Addr>().ok()?;
        fields.any(|f| f == interface).then_some(addr)
    })
}
