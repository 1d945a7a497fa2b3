//! Client for the RomM REST catalog.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{basic_auth_header, fetch_to_path, join_url};
use super::{CatalogClient, ClientError, HostType};
use crate::catalog::CatalogItem;
use crate::downloader::DownloadRequest;

const ROMS_ENDPOINT: &str = "api/roms";
const PLATFORMS_ENDPOINT: &str = "api/platforms";
const RESOURCES_PATH: &str = "/assets/romm/resources/";
const PAGE_SIZE: usize = 250;

/// A platform as reported by `/api/platforms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RommPlatform {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub rom_count: u64,
}

#[derive(Debug, Deserialize)]
struct RommRom {
    id: u64,
    fs_name: String,
    #[serde(default)]
    fs_size_bytes: u64,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    path_cover_large: Option<String>,
}

impl From<RommRom> for CatalogItem {
    fn from(rom: RommRom) -> Self {
        let art_url = rom
            .path_cover_large
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", RESOURCES_PATH, p.trim_start_matches('/')));
        CatalogItem {
            filename: rom.fs_name,
            file_size: rom.fs_size_bytes.to_string(),
            last_modified: rom.updated_at,
            source_id: Some(rom.id.to_string()),
            art_url,
            ..Default::default()
        }
    }
}

/// `/api/roms` answers with a bare array on older servers and a page
/// object on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RomsResponse {
    Page { items: Vec<RommRom>, total: u64 },
    List(Vec<RommRom>),
}

pub struct RommClient {
    http: Client,
    base_url: String,
    auth_header: String,
}

impl RommClient {
    pub fn new(
        http: Client,
        root_uri: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Self, ClientError> {
        let mut url = Url::parse(root_uri).map_err(|e| {
            ClientError::Configuration(format!("invalid RomM URL '{}': {}", root_uri, e))
        })?;
        if port != 0 {
            url.set_port(Some(port)).map_err(|_| {
                ClientError::Configuration(format!("cannot set port on '{}'", root_uri))
            })?;
        }

        Ok(Self {
            http,
            base_url: url.into(),
            auth_header: basic_auth_header(username, password),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("invalid RomM response from {}: {}", url, e)))
    }

    /// All platforms known to the server.
    pub async fn list_platforms(&self) -> Result<Vec<RommPlatform>, ClientError> {
        let url = join_url(&self.base_url, &[PLATFORMS_ENDPOINT], false)?;
        debug!(url = %url, "Listing RomM platforms");
        self.get_json(url).await
    }
}

#[async_trait]
impl CatalogClient for RommClient {
    fn host_type(&self) -> HostType {
        HostType::Romm
    }

    async fn list_directory(&self, locator: &str) -> Result<Vec<CatalogItem>, ClientError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut url = join_url(&self.base_url, &[ROMS_ENDPOINT], false)?;
            url.query_pairs_mut()
                .append_pair("platform_id", locator)
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("offset", &offset.to_string());
            debug!(url = %url, "Listing RomM roms");

            match self.get_json::<RomsResponse>(url).await? {
                RomsResponse::List(roms) => {
                    items.extend(roms.into_iter().map(CatalogItem::from));
                    break;
                }
                RomsResponse::Page { items: roms, total } => {
                    let count = roms.len();
                    items.extend(roms.into_iter().map(CatalogItem::from));
                    offset += count;
                    if count == 0 || offset as u64 >= total {
                        break;
                    }
                }
            }
        }

        Ok(items)
    }

    /// Rom ids resolve to the content endpoint; any other locator is a path
    /// below the server root (cover art).
    fn source_url(&self, locator: &str, filename: &str) -> Result<String, ClientError> {
        let url = if !locator.is_empty() && locator.bytes().all(|b| b.is_ascii_digit()) {
            join_url(&self.base_url, &[ROMS_ENDPOINT, locator, "content", filename], false)?
        } else {
            join_url(&self.base_url, &[locator, filename], false)?
        };
        Ok(url.into())
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<u64, ClientError> {
        let authorization = request
            .authorization
            .as_deref()
            .unwrap_or(&self.auth_header);
        fetch_to_path(
            &self.http,
            &request.source_url,
            Some(authorization),
            &request.destination_path,
        )
        .await
    }
}
