// SPDX-License-Identifier: Apache-2.0

//! Configuration of a guest EPC backend
//!
//! The configuration is usually read from a `Vepc.toml` file:
//!
//! ```
//! use vepc::config::Config;
//!
//! let config: Config = toml::from_str(r#"
//! id = "epc0"
//! size = "64M"
//! reclaim = true
//! "#).unwrap();
//!
//! assert_eq!(config.size.bytes(), 64 << 20);
//! assert!(config.reclaim);
//! ```

use crate::host::DEVICE;
use crate::Error;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Configuration file template
pub const CONFIG_TEMPLATE: &str = r#"## Configuration for a guest EPC memory backend

## Unique identifier of the backend
id = "epc0"

## Size of the guest EPC (bytes, or with a K, M, G or T suffix)
size = "64M"

## Enable reclaim of guest EPC
## This needs `reclaim-cap`, the host's KVM capability number for EPC reclaim.
# reclaim = true
# reclaim-cap = 0

## Populate every page when the backend is acquired
# prealloc = false

## The virtual EPC device
# device = "/dev/sgx_vepc"
"#;

fn default_id() -> String {
    "epc0".into()
}

fn default_device() -> PathBuf {
    DEVICE.into()
}

/// The configuration of one guest EPC backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// The unique identifier of the backend
    #[serde(default = "default_id")]
    pub id: String,

    /// The size of the guest EPC
    pub size: Size,

    /// Enable reclaim of guest EPC
    #[serde(default)]
    pub reclaim: bool,

    /// Populate every page on acquisition
    #[serde(default)]
    pub prealloc: bool,

    /// The virtual EPC device node
    #[serde(default = "default_device")]
    pub device: PathBuf,

    /// The KVM capability used to enable reclaim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_cap: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: default_id(),
            size: Size(0),
            reclaim: false,
            prealloc: false,
            device: default_device(),
            reclaim_cap: None,
        }
    }
}

/// A size in bytes
///
/// Parsed from a plain integer or from a string with an optional binary
/// unit suffix: `K`, `M`, `G` or `T`, optionally followed by `iB`, or `B`
/// alone for bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Size(usize);

impl Size {
    const UNITS: [(char, u32); 4] = [('K', 10), ('M', 20), ('G', 30), ('T', 40)];

    /// Creates a size from a byte count.
    pub const fn new(bytes: usize) -> Self {
        Self(bytes)
    }

    /// The size in bytes
    pub const fn bytes(self) -> usize {
        self.0
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidConfig(format!("invalid size {:?}", s));

        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let value: usize = digits.parse().map_err(|_| invalid())?;

        let unit = unit.trim_start();
        let unit = unit
            .strip_suffix("iB")
            .or_else(|| unit.strip_suffix('B').filter(|u| !u.is_empty()))
            .unwrap_or(unit);

        let shift = match unit {
            "" | "B" => 0,
            u => {
                let mut chars = u.chars();
                let c = chars.next().map(|c| c.to_ascii_uppercase());
                match (c, chars.next()) {
                    (Some(c), None) => Self::UNITS
                        .iter()
                        .find(|(u, _)| *u == c)
                        .map(|(_, shift)| *shift)
                        .ok_or_else(invalid)?,
                    _ => return Err(invalid()),
                }
            }
        };

        value
            .checked_mul(1usize.checked_shl(shift).ok_or_else(invalid)?)
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (unit, shift) in Self::UNITS.iter().rev() {
            let scale = match 1usize.checked_shl(*shift) {
                Some(scale) => scale,
                None => continue,
            };

            if self.0 != 0 && self.0 % scale == 0 {
                return write!(f, "{}{}", self.0 / scale, unit);
            }
        }

        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Size {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => usize::try_from(n)
                .map(Self)
                .map_err(|_| D::Error::custom(format!("size {} is too large", n))),
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

impl Serialize for Size {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
