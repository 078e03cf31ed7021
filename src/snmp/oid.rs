use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Некорректная строка OID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid OID '{input}': {reason}")]
pub struct OidParseError {
    pub input: String,
    pub reason: String,
}

/// Собственный OID в точечной записи.
///
/// Не зависит от буфера ответа, поэтому его разделяют сессии, фейки и записи
/// результатов.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Vec<u64>);

impl ObjectId {
    pub fn new(arcs: impl Into<Vec<u64>>) -> Self {
        Self(arcs.into())
    }

    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Новый OID с добавленной дугой `arc` (колонка + индекс строки).
    pub fn child(&self, arc: u64) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Self(arcs)
    }

    pub fn starts_with(&self, prefix: &ObjectId) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Дуги после `prefix` или `None`, если `self` вне поддерева.
    pub fn suffix_after(&self, prefix: &ObjectId) -> Option<&[u64]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }

    pub fn last(&self) -> Option<u64> {
        self.0.last().copied()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Result<Vec<u64>, _> = s
            .trim()
            .split('.')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>())
            .collect();

        let parts = parts.map_err(|e| OidParseError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;

        if parts.is_empty() {
            return Err(OidParseError {
                input: s.to_string(),
                reason: "no arcs".to_string(),
            });
        }

        Ok(Self(parts))
    }
}

impl serde::Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Разбирает OID в точечной записи. Ведущие точки и пробелы по краям игнорируются.
pub fn parse_oid(s: &str) -> Result<ObjectId, OidParseError> {
    s.parse()
}
