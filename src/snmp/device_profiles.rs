use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;

use super::oid::{ObjectId, parse_oid};

/// sysObjectID.0
pub static SYS_OBJECT_ID: LazyLock<ObjectId> =
    LazyLock::new(|| ObjectId::new([1, 3, 6, 1, 2, 1, 1, 2, 0]));

/// Производитель маршрутизатора по sysObjectID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Linux,
    Cisco,
    Hp,
    Juniper,
    Huawei,
    Generic,
}

impl Vendor {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Linux => "Linux Net-SNMP Agent",
            Self::Cisco => "Cisco Device",
            Self::Hp => "HP Device",
            Self::Juniper => "Juniper Device",
            Self::Huawei => "Huawei Device",
            Self::Generic => "Unknown Device",
        }
    }

    /// Скалярный OID загрузки CPU для производителя, если такой есть.
    pub fn cpu_oid(&self) -> Option<ObjectId> {
        let oid = match self {
            // avgBusy1 (OLD-CISCO-CPU-MIB)
            Self::Cisco => "1.3.6.1.4.1.9.2.1.57.0",
            // ssCpuUser (UCD-SNMP-MIB)
            Self::Linux => "1.3.6.1.4.1.2021.11.9.0",
            // jnxOperatingCPU, routing engine
            Self::Juniper => "1.3.6.1.4.1.2636.3.1.13.1.8.9.1.0.0",
            // hpSwitchCpuStat
            Self::Hp => "1.3.6.1.4.1.11.2.14.11.5.1.9.6.1.0",
            // У Huawei и в HOST-RESOURCES загрузка лежит в таблицах, а не в скалярах.
            Self::Huawei | Self::Generic => return None,
        };
        parse_oid(oid).ok()
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Определение производителя по enterprise-ветке sysObjectID.
pub struct DeviceDetector;

impl DeviceDetector {
    const ENTERPRISES: [u64; 6] = [1, 3, 6, 1, 4, 1];

    pub fn detect(sys_object_id: &ObjectId) -> Vendor {
        let enterprises = ObjectId::new(Self::ENTERPRISES);
        match sys_object_id
            .suffix_after(&enterprises)
            .and_then(|arcs| arcs.first())
        {
            Some(8072) => Vendor::Linux,
            Some(9) => Vendor::Cisco,
            Some(11) => Vendor::Hp,
            Some(2636) => Vendor::Juniper,
            Some(2011) => Vendor::Huawei,
            _ => Vendor::Generic,
        }
    }
}
