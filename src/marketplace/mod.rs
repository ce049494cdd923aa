//! Marketplace API client
//!
//! Typed reqwest client for the deals marketplace REST API: vendor and
//! activity listings consumed by the event-sourcing agent, and the
//! deal-creation endpoint used by the publisher. Responses are parsed into
//! typed structs at this boundary; unknown fields are retained through
//! `serde(flatten)` so full payload snapshots survive round-trips.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;

/// Marketplace client specific errors
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("invalid marketplace base URL '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("failed to build marketplace HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("network error calling marketplace: {0}")]
    Network(#[from] reqwest::Error),

    #[error("marketplace returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed marketplace response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Vendor listing entry from `GET vendor/lists/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorSummary {
    pub vendor_id: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct VendorList {
    #[serde(default)]
    vendors: Vec<VendorSummary>,
}

/// A vendor address with its coordinates and postal breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorAddress {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub house_no_building_name: Option<String>,
    #[serde(default)]
    pub road_name_area_colony: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    pub latitude: String,
    pub longitude: String,
}

impl VendorAddress {
    /// Parse the string coordinates, if they are numeric.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((
            self.latitude.trim().parse().ok()?,
            self.longitude.trim().parse().ok()?,
        ))
    }
}

/// Vendor details from `GET vendor/details/{id}/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorDetails {
    pub vendor_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<VendorAddress>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCategory {
    pub actv_category: String,
}

/// Activity entry from `GET activities/lists/` or `GET activities/details/{id}/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub activity_title: String,
    #[serde(default)]
    pub activity_category: Option<ActivityCategory>,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub end_time: String,
    pub latitude: String,
    pub longitude: String,
    #[serde(default)]
    pub location: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Activity {
    /// Parse the string coordinates, if they are numeric.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((
            self.latitude.trim().parse().ok()?,
            self.longitude.trim().parse().ok()?,
        ))
    }

    /// Category tag, when the marketplace supplied one.
    pub fn category(&self) -> Option<&str> {
        self.activity_category
            .as_ref()
            .map(|c| c.actv_category.as_str())
    }
}

/// Image pair accepted by the deal-creation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealImage {
    pub thumbnail: String,
    pub compressed: String,
}

/// Payload for `POST create-deal/hackathon/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDealRequest {
    pub deal_title: String,
    pub deal_description: String,
    pub select_service: String,
    pub uploaded_images: Vec<DealImage>,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub start_now: String,
    pub actual_price: String,
    pub deal_price: String,
    pub available_deals: String,
    pub location_house_no: String,
    pub location_road_name: String,
    pub location_country: String,
    pub location_state: String,
    pub location_city: String,
    pub location_pincode: String,
    pub vendor_kyc: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DealResponseData {
    #[serde(default)]
    pub deal_uuid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Success body of the deal-creation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDealResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<DealResponseData>,
}

/// Client for the marketplace REST API
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl MarketplaceClient {
    /// Create a client from application configuration.
    pub fn new(config: &AppConfig) -> Result<Self, MarketplaceError> {
        Self::with_base_url(
            &config.marketplace_base_url,
            Duration::from_secs(config.marketplace_timeout_seconds),
        )
    }

    /// Create a client against an explicit base URL (used by tests to point
    /// at a mock server).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, MarketplaceError> {
        // Url::join drops the last path segment unless the base ends in '/'.
        let mut normalized = base_url.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }

        let base_url = Url::parse(&normalized).map_err(|source| MarketplaceError::InvalidBaseUrl {
            value: normalized.clone(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MarketplaceError::ClientBuild)?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, MarketplaceError> {
        self.base_url
            .join(path)
            .map_err(|source| MarketplaceError::InvalidBaseUrl {
                value: format!("{}{}", self.base_url, path),
                source,
            })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, MarketplaceError> {
        let url = self.endpoint(path)?;
        debug!(%url, "Marketplace GET");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MarketplaceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// List all vendors.
    pub async fn list_vendors(&self) -> Result<Vec<VendorSummary>, MarketplaceError> {
        let list: VendorList = self.get_json("vendor/lists/").await?;
        Ok(list.vendors)
    }

    /// Fetch details (addresses, KYC) for one vendor.
    pub async fn vendor_details(&self, vendor_id: &str) -> Result<VendorDetails, MarketplaceError> {
        self.get_json(&format!("vendor/details/{}/", vendor_id))
            .await
    }

    /// List all current activities.
    pub async fn list_activities(&self) -> Result<Vec<Activity>, MarketplaceError> {
        self.get_json("activities/lists/").await
    }

    /// Fetch details for one activity.
    pub async fn activity_details(&self, activity_id: &str) -> Result<Activity, MarketplaceError> {
        self.get_json(&format!("activities/details/{}/", activity_id))
            .await
    }

    /// Create a live deal on the marketplace.
    pub async fn create_deal(
        &self,
        request: &CreateDealRequest,
    ) -> Result<CreateDealResponse, MarketplaceError> {
        let url = self.endpoint("create-deal/hackathon/")?;
        debug!(%url, deal_title = %request.deal_title, "Marketplace create-deal POST");

        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MarketplaceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
