use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::types::{Bay, BayStatus, BayStatusUpdate, GeoPoint};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backend that serves the bay catalogue and live sensor status.
pub trait StatusFeed: Send + Sync {
    /// The full static set of bays.
    fn fetch_bays(&self) -> impl Future<Output = Result<Vec<Bay>>> + Send;

    /// Current occupancy for the bays the server covers around `center`.
    fn fetch_status_around(
        &self,
        center: GeoPoint,
    ) -> impl Future<Output = Result<Vec<BayStatusUpdate>>> + Send;
}

/// Catalogue entry as served by `GET /bays`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BayRecord {
    bay_id: i64,
    lat: f64,
    lng: f64,
    description: Option<String>,
}

/// Sensor reading as served by `GET /bays/state`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BayStateRecord {
    bay_id: i64,
    status: String,
    timestamp: Option<DateTime<Utc>>,
}

fn build_bays_url(base_url: &str) -> String {
    format!("{}/bays", base_url.trim_end_matches('/'))
}

fn build_state_url(base_url: &str, center: GeoPoint, distance_m: f64) -> String {
    format!(
        "{}/bays/state?lat={}&lng={}&distance={}",
        base_url.trim_end_matches('/'),
        center.lat,
        center.lng,
        distance_m.round()
    )
}

/// Sensor vocabulary: a car is `Present` or the bay is `Unoccupied`.
fn parse_status(raw: &str) -> Option<BayStatus> {
    match raw.trim() {
        s if s.eq_ignore_ascii_case("Present") => Some(BayStatus::Occupied),
        s if s.eq_ignore_ascii_case("Unoccupied") => Some(BayStatus::Available),
        _ => None,
    }
}

fn into_bay(record: BayRecord) -> Bay {
    Bay {
        bay_id: record.bay_id,
        position: GeoPoint::new(record.lat, record.lng),
        description: record.description,
        available: false,
        status_updated_at: None,
    }
}

fn into_updates(records: Vec<BayStateRecord>) -> Vec<BayStatusUpdate> {
    records
        .into_iter()
        .filter_map(|r| match parse_status(&r.status) {
            Some(status) => Some(BayStatusUpdate {
                bay_id: r.bay_id,
                status,
                observed_at: r.timestamp,
            }),
            None => {
                warn!(event = "feed.unknown_status", bay_id = r.bay_id, status = %r.status);
                None
            }
        })
        .collect()
}

/// `StatusFeed` over the parking backend's JSON API.
#[derive(Debug, Clone)]
pub struct HttpStatusFeed {
    client: Client,
    base_url: String,
    coverage_radius_m: f64,
}

impl HttpStatusFeed {
    pub fn new(config: &FeedConfig, coverage_radius_m: f64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            coverage_radius_m,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Feed(format!("{url} returned {}", resp.status())));
        }
        Ok(resp.json().await?)
    }
}

impl StatusFeed for HttpStatusFeed {
    async fn fetch_bays(&self) -> Result<Vec<Bay>> {
        let url = build_bays_url(&self.base_url);
        let records: Vec<BayRecord> = self.get_json(&url).await?;
        debug!(event = "feed.bays_fetched", count = records.len());
        Ok(records.into_iter().map(into_bay).collect())
    }

    async fn fetch_status_around(&self, center: GeoPoint) -> Result<Vec<BayStatusUpdate>> {
        let url = build_state_url(&self.base_url, center, self.coverage_radius_m);
        let records: Vec<BayStateRecord> = self.get_json(&url).await?;
        debug!(event = "feed.status_fetched", %center, count = records.len());
        Ok(into_updates(records))
    }
}
