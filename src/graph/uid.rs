use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::StoreError;

/// Store-assigned node identity, rendered as `0x<hex>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub i64);

impl Uid {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for Uid {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix("0x")
            .ok_or_else(|| StoreError::graph(format!("uid `{s}` lacks the 0x prefix")))?;
        let value = i64::from_str_radix(hex, 16)
            .map_err(|err| StoreError::graph(format!("invalid uid `{s}`: {err}")))?;
        if value <= 0 {
            return Err(StoreError::graph(format!("invalid uid `{s}`")));
        }
        Ok(Uid(value))
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
