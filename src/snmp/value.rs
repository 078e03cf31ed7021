use std::fmt;
use std::net::Ipv4Addr;

use super::oid::ObjectId;

/// Собственное типизированное значение SNMP.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(ObjectId),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    Opaque(Vec<u8>),
    Boolean(bool),
    Null,
    /// Всё, для чего нет отдельного варианта, хранится как debug-текст.
    Other(String),
}

impl SnmpValue {
    /// Целое значение числовых вариантов.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Counter32(v) | Self::Unsigned32(v) | Self::Timeticks(v) => Some(i64::from(*v)),
            Self::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Числовое значение для графика. Octet string с десятичным числом тоже
    /// разбирается (некоторые агенты отдают gauge текстом).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Counter64(v) => Some(*v as f64),
            Self::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Текст octet string, не-UTF-8 байты заменяются.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => f.write_str(text),
                Err(_) => {
                    for (i, b) in bytes.iter().enumerate() {
                        if i > 0 {
                            f.write_str(":")?;
                        }
                        write!(f, "{b:02x}")?;
                    }
                    Ok(())
                }
            },
            Self::ObjectId(oid) => write!(f, "{oid}"),
            Self::IpAddress(addr) => write!(f, "{addr}"),
            Self::Counter32(v) | Self::Unsigned32(v) | Self::Timeticks(v) => write!(f, "{v}"),
            Self::Counter64(v) => write!(f, "{v}"),
            Self::Opaque(bytes) => write!(f, "opaque({} bytes)", bytes.len()),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(SnmpValue::Integer(42).as_f64(), Some(42.0));
        assert_eq!(SnmpValue::Counter32(7).as_i64(), Some(7));
        assert_eq!(SnmpValue::OctetString(b" 13 ".to_vec()).as_f64(), Some(13.0));
        assert_eq!(SnmpValue::OctetString(b"Fa0/0".to_vec()).as_f64(), None);
        assert_eq!(SnmpValue::Null.as_f64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SnmpValue::OctetString(b"Fa0/0".to_vec()).to_string(), "Fa0/0");
        assert_eq!(
            SnmpValue::OctetString(vec![0xca, 0x02, 0xff]).to_string(),
            "ca:02:ff"
        );
        assert_eq!(
            SnmpValue::IpAddress(Ipv4Addr::new(10, 0, 0, 1)).to_string(),
            "10.0.0.1"
        );
    }
}
