//! MAST portal API client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tce_core::config::MastConfig;
use tce_core::{Error, Result, Sector, SectorSet, TicId};
use tokio::io::AsyncWriteExt;

use crate::archive::{DataProduct, LightCurveArchive, Observation};
use crate::protocol::{
    Filter, FilteredParams, InvokeRequest, InvokeResponse, ObservationRow, ProductRow,
    ProductsParams, SERVICE_FILTERED, SERVICE_PRODUCTS, STATUS_COMPLETE,
};

const USER_AGENT: &str = concat!("tce-harvest/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_EXCERPT_LEN: usize = 200;

/// Client for the MAST portal API.
#[derive(Debug, Clone)]
pub struct MastClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl MastClient {
    /// Creates a client from configuration.
    pub fn new(config: &MastConfig) -> Result<Self> {
        Self::with_base_url(&config.base_url, config.timeout())
    }

    /// Creates a client for an explicit base URL.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn invoke_url(&self) -> String {
        format!("{}/api/v0/invoke", self.base_url)
    }

    fn download_url(&self) -> String {
        format!("{}/api/v0.1/Download/file", self.base_url)
    }

    async fn invoke<P, R>(&self, service: &'static str, params: P) -> Result<Vec<R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = serde_json::to_string(&InvokeRequest::new(service, params))?;

        tracing::debug!(service, "MAST invoke");

        let response = self
            .http
            .post(self.invoke_url())
            .form(&[("request", request)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: InvokeResponse<R> = serde_json::from_slice(&body)?;

        if parsed.status != STATUS_COMPLETE {
            tracing::debug!(
                service,
                status = %parsed.status,
                msg = parsed.msg.as_deref().unwrap_or(""),
                "MAST query not complete"
            );
            return Err(Error::ArchivePending {
                service: service.to_string(),
                status: parsed.status,
            });
        }

        Ok(parsed.data)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            return Error::Timeout {
                seconds: self.timeout.as_secs(),
            };
        }
        if let Some(status) = e.status() {
            return Error::archive(status.as_u16(), e.to_string());
        }
        Error::network_with_source("MAST request failed", e)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(ERROR_EXCERPT_LEN).collect();
    let reason = status.canonical_reason().unwrap_or("unknown status");
    Err(Error::archive(
        status.as_u16(),
        if excerpt.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{reason}: {}", excerpt.trim())
        },
    ))
}

fn to_observation(row: ObservationRow, tic: TicId, sectors: &SectorSet) -> Option<Observation> {
    if row.target_name.parse::<TicId>().ok()? != tic {
        return None;
    }
    let sector = u16::try_from(row.sequence_number?)
        .ok()
        .and_then(|s| Sector::new(s).ok())?;
    if !sectors.contains(sector) {
        return None;
    }
    Some(Observation {
        obsid: row.obsid,
        obs_id: row.obs_id,
        tic,
        sector,
        author: row.provenance_name.unwrap_or_else(|| "UNKNOWN".to_string()),
        exptime: row.t_exptime,
    })
}

#[async_trait]
impl LightCurveArchive for MastClient {
    async fn search(&self, tic: TicId, sectors: &SectorSet) -> Result<Vec<Observation>> {
        let params = FilteredParams {
            columns: "*",
            filters: vec![
                Filter::new("obs_collection", vec![json!("TESS")]),
                Filter::new("dataproduct_type", vec![json!("timeseries")]),
                Filter::new("target_name", vec![json!(tic.target_name())]),
                Filter::new(
                    "sequence_number",
                    sectors.iter().map(|s| json!(s.get())).collect(),
                ),
            ],
        };

        let rows: Vec<ObservationRow> = self.invoke(SERVICE_FILTERED, params).await?;
        let total = rows.len();
        let observations: Vec<Observation> = rows
            .into_iter()
            .filter_map(|row| to_observation(row, tic, sectors))
            .collect();

        tracing::debug!(%tic, %sectors, rows = total, kept = observations.len(), "MAST search");
        Ok(observations)
    }

    async fn products(&self, observation: &Observation) -> Result<Vec<DataProduct>> {
        let rows: Vec<ProductRow> = self
            .invoke(
                SERVICE_PRODUCTS,
                ProductsParams {
                    obsid: observation.obsid.clone(),
                },
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| DataProduct {
                obs_id: row.obs_id.unwrap_or_else(|| observation.obs_id.clone()),
                filename: row.product_filename,
                data_uri: row.data_uri,
                subgroup: row.subgroup.unwrap_or_default(),
                size: row.size,
            })
            .collect())
    }

    async fn fetch(&self, product: &DataProduct, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(e, parent))?;
        }

        let response = self
            .http
            .get(self.download_url())
            .query(&[("uri", product.data_uri.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let mut response = check_status(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(Error::archive(204, "empty download"));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_with_path(e, dest))?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(e, dest))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::io_with_path(e, dest))?;

        if let Some(expected) = product.size.filter(|size| *size != written) {
            return Err(Error::network(format!(
                "short download of {}: {written} of {expected} bytes",
                product.filename
            )));
        }

        tracing::debug!(file = %product.filename, bytes = written, "Downloaded");
        Ok(written)
    }
}
