//! Host types and table column configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ClientError;

/// Closed set of supported remote backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    /// Apache `mod_autoindex` listing.
    Apache,
    /// Megathread-style HTML table (slow, cached).
    Megathread,
    /// Any HTML table with user-defined headers.
    Custom,
    /// nginx `autoindex_format json`.
    Nginx,
    Smb,
    /// RomM REST catalog.
    Romm,
}

impl HostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostType::Apache => "apache",
            HostType::Megathread => "megathread",
            HostType::Custom => "custom",
            HostType::Nginx => "nginx",
            HostType::Smb => "smb",
            HostType::Romm => "romm",
        }
    }

    /// Listings from this host are cached on disk.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, HostType::Megathread)
    }

    /// Leading rows of a converted HTML table that hold headers.
    pub fn header_rows(&self) -> usize {
        1
    }

    /// Host is scraped as an HTML table.
    pub fn is_table(&self) -> bool {
        matches!(
            self,
            HostType::Apache | HostType::Megathread | HostType::Custom
        )
    }

    /// Transfers go over HTTP.
    pub fn is_http(&self) -> bool {
        !matches!(self, HostType::Smb)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apache" => Ok(HostType::Apache),
            "megathread" => Ok(HostType::Megathread),
            "custom" => Ok(HostType::Custom),
            "nginx" => Ok(HostType::Nginx),
            "smb" => Ok(HostType::Smb),
            "romm" => Ok(HostType::Romm),
            other => Err(ClientError::Configuration(format!(
                "unknown host type: {}",
                other
            ))),
        }
    }
}

/// Header texts of the filename, size and date columns of a custom table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    #[serde(default)]
    pub filename_header: String,
    #[serde(default)]
    pub file_size_header: String,
    #[serde(default)]
    pub date_header: String,
}
