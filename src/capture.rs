//! Поиск MAC-адреса в захваченном трафике.
//!
//! Читает классические файлы libpcap (любой порядок байт, микро- или
//! наносекундные метки) с кадрами Ethernet. pcapng не поддерживается.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;
const ETHERNET_HEADER_LEN: usize = 14;
const LINKTYPE_ETHERNET: u32 = 1;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
const MAGIC_PCAPNG: u32 = 0x0a0d_0d0a;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read capture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported capture format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported link type {0}, expected Ethernet")]
    UnsupportedLinkType(u32),

    #[error("capture truncated at byte {0}")]
    Truncated(usize),

    #[error("invalid MAC address '{0}'")]
    InvalidMac(String),
}

/// 48-битный аппаратный адрес.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Двенадцать hex-цифр в нижнем регистре без разделителей.
    pub fn compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Точечная запись IOS, `ca02.31b1.0000`.
    pub fn dotted(&self) -> String {
        let hex = self.compact();
        format!("{}.{}.{}", &hex[0..4], &hex[4..8], &hex[8..12])
    }

    /// client-identifier для DHCP в IOS: тип среды 01 и адрес.
    pub fn client_identifier(&self) -> String {
        let hex = format!("01{}", self.compact());
        hex.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl FromStr for MacAddr {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CaptureError::InvalidMac(s.to_string());
        let trimmed = s.trim();

        let groups: Vec<&str> = if trimmed.contains([':', '-']) {
            let groups: Vec<&str> = trimmed.split([':', '-']).collect();
            if groups.len() != 6
                || groups
                    .iter()
                    .any(|g| g.is_empty() || g.len() > 2 || !g.chars().all(|c| c.is_ascii_hexdigit()))
            {
                return Err(invalid());
            }
            groups
        } else {
            let hex: String = trimmed.chars().filter(|c| *c != '.').collect();
            if trimmed.contains('.')
                && trimmed.split('.').map(str::len).collect::<Vec<_>>() != [4, 4, 4]
            {
                return Err(invalid());
            }
            if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            return parse_compact(&hex).ok_or_else(invalid);
        };

        let mut octets = [0u8; 6];
        for (slot, group) in octets.iter_mut().zip(groups) {
            *slot = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

fn parse_compact(hex: &str) -> Option<MacAddr> {
    let mut octets = [0u8; 6];
    for (i, slot) in octets.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(MacAddr(octets))
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Приводит любую допустимую запись MAC к виду с двоеточиями в нижнем регистре.
pub fn format_mac(raw: &str) -> Result<String, CaptureError> {
    Ok(raw.parse::<MacAddr>()?.to_string())
}

/// Адрес источника первого кадра Ethernet в файле захвата.
///
/// `Ok(None)`, если в файле нет ни одного полного заголовка Ethernet.
pub fn extract_first_source_mac(path: impl AsRef<Path>) -> Result<Option<MacAddr>, CaptureError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mac = first_source_mac(&bytes)?;
    tracing::debug!(path = %path.display(), mac = ?mac, "capture scanned");
    Ok(mac)
}

/// То же, что [`extract_first_source_mac`], но для захвата в памяти.
pub fn first_source_mac(bytes: &[u8]) -> Result<Option<MacAddr>, CaptureError> {
    if bytes.len() < GLOBAL_HEADER_LEN {
        return Err(CaptureError::Truncated(bytes.len()));
    }

    let magic_le = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let little_endian = match magic_le {
        MAGIC_MICROS | MAGIC_NANOS => true,
        m if m.swap_bytes() == MAGIC_MICROS || m.swap_bytes() == MAGIC_NANOS => false,
        MAGIC_PCAPNG => {
            return Err(CaptureError::UnsupportedFormat("pcapng".to_string()));
        }
        other => {
            return Err(CaptureError::UnsupportedFormat(format!(
                "unknown magic 0x{other:08x}"
            )));
        }
    };
    let read_u32 = |at: usize| {
        let raw = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        if little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        }
    };

    let link_type = read_u32(20);
    if link_type != LINKTYPE_ETHERNET {
        return Err(CaptureError::UnsupportedLinkType(link_type));
    }

    let mut offset = GLOBAL_HEADER_LEN;
    while offset < bytes.len() {
        if offset + RECORD_HEADER_LEN > bytes.len() {
            return Err(CaptureError::Truncated(offset));
        }
        let captured = read_u32(offset + 8) as usize;
        let data_start = offset + RECORD_HEADER_LEN;
        let data_end = data_start
            .checked_add(captured)
            .filter(|end| *end <= bytes.len())
            .ok_or(CaptureError::Truncated(data_start))?;

        if captured >= ETHERNET_HEADER_LEN {
            let mut src = [0u8; 6];
            src.copy_from_slice(&bytes[data_start + 6..data_start + 12]);
            return Ok(Some(MacAddr(src)));
        }
        offset = data_end;
    }

    Ok(None)
}
