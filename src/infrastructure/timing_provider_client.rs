use crate::domain::clock::ClockTime;
use crate::domain::models::{GeoCoordinates, SavedCity, TimingSet};
use crate::infrastructure::error::{InfraError, ResolutionError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const COORDINATES_ROUTE: &str = "timings";
const CITY_ROUTE: &str = "timingsByCity";
const PROVIDER_SUCCESS_CODE: u16 = 200;
const NETWORK_ERROR_MESSAGE: &str = "Network Error";

/// Parameters shared by both provider routes. `method` is always a
/// provider-native id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRequest {
    pub timestamp: i64,
    pub method: u16,
    pub school: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTimings {
    pub timings: TimingSet,
    pub time_zone: String,
}

#[async_trait]
pub trait TimingProviderClient: Send + Sync {
    async fn timings_by_coordinates(
        &self,
        coordinates: GeoCoordinates,
        request: ProviderRequest,
    ) -> Result<ProviderTimings, ResolutionError>;

    async fn timings_by_city(
        &self,
        city: &SavedCity,
        request: ProviderRequest,
    ) -> Result<ProviderTimings, ResolutionError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTimingProviderClient {
    client: Client,
    base_url: Url,
}

impl ReqwestTimingProviderClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            InfraError::InvalidConfig(format!("failed to build provider http client: {error}"))
        })?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, route: &str, timestamp: i64) -> Result<Url, ResolutionError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ResolutionError::NetworkError(format!(
                    "provider base URL cannot be a base: {}",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty();
            segments.push(route);
            segments.push(&timestamp.to_string());
        }
        Ok(url)
    }

    async fn fetch(
        &self,
        endpoint: Url,
        query: &[(&str, String)],
    ) -> Result<ProviderTimings, ResolutionError> {
        let response = self
            .client
            .get(endpoint.clone())
            .query(query)
            .send()
            .await
            .map_err(|error| {
                tracing::warn!(%endpoint, %error, "timing provider request failed");
                ResolutionError::NetworkError(NETWORK_ERROR_MESSAGE.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            tracing::warn!(%endpoint, %error, "failed reading timing provider response");
            ResolutionError::NetworkError(NETWORK_ERROR_MESSAGE.to_string())
        })?;

        let envelope = serde_json::from_str::<ProviderEnvelope>(&body).ok();
        if !status.is_success() {
            return Err(ResolutionError::ProviderRejected {
                code: envelope
                    .as_ref()
                    .and_then(|envelope| envelope.code)
                    .unwrap_or_else(|| status.as_u16()),
                message: envelope
                    .and_then(|envelope| envelope.data_message())
                    .unwrap_or_else(|| format!("provider returned http {}", status.as_u16())),
            });
        }

        let envelope = envelope.ok_or_else(|| {
            tracing::warn!(%endpoint, body_len = body.len(), "timing provider payload is not valid JSON");
            ResolutionError::NetworkError("invalid provider payload".to_string())
        })?;
        let code = envelope.code.unwrap_or(PROVIDER_SUCCESS_CODE);
        if code != PROVIDER_SUCCESS_CODE {
            return Err(ResolutionError::ProviderRejected {
                code,
                message: envelope
                    .data_message()
                    .unwrap_or_else(|| format!("provider returned code {code}")),
            });
        }

        parse_provider_data(envelope.data)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderEnvelope {
    code: Option<u16>,
    #[serde(default)]
    data: serde_json::Value,
}

impl ProviderEnvelope {
    fn data_message(&self) -> Option<String> {
        self.data
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderData {
    timings: RawTimings,
    meta: ProviderMeta,
}

#[derive(Debug, Deserialize)]
struct ProviderMeta {
    timezone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTimings {
    fajr: String,
    sunrise: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
    imsak: String,
}

fn parse_provider_data(data: serde_json::Value) -> Result<ProviderTimings, ResolutionError> {
    let parsed: ProviderData = serde_json::from_value(data).map_err(|error| {
        ResolutionError::NetworkError(format!("invalid provider payload: {error}"))
    })?;

    let time_zone = parsed.meta.timezone.trim().to_string();
    if time_zone.is_empty() {
        return Err(ResolutionError::NetworkError(
            "invalid provider payload: missing meta.timezone".to_string(),
        ));
    }

    let raw = parsed.timings;
    Ok(ProviderTimings {
        timings: TimingSet {
            fajr: parse_provider_clock(&raw.fajr, "Fajr")?,
            sunrise: parse_provider_clock(&raw.sunrise, "Sunrise")?,
            dhuhr: parse_provider_clock(&raw.dhuhr, "Dhuhr")?,
            asr: parse_provider_clock(&raw.asr, "Asr")?,
            maghrib: parse_provider_clock(&raw.maghrib, "Maghrib")?,
            isha: parse_provider_clock(&raw.isha, "Isha")?,
            imsak: parse_provider_clock(&raw.imsak, "Imsak")?,
        },
        time_zone,
    })
}

// The provider may append a zone abbreviation, e.g. "05:10 (EET)".
fn parse_provider_clock(raw: &str, field_name: &str) -> Result<ClockTime, ResolutionError> {
    raw.split_whitespace()
        .next()
        .unwrap_or_default()
        .parse::<ClockTime>()
        .map_err(|error| {
            ResolutionError::NetworkError(format!("invalid provider payload: timings.{field_name} {error}"))
        })
}

#[async_trait]
impl TimingProviderClient for ReqwestTimingProviderClient {
    async fn timings_by_coordinates(
        &self,
        coordinates: GeoCoordinates,
        request: ProviderRequest,
    ) -> Result<ProviderTimings, ResolutionError> {
        let endpoint = self.endpoint(COORDINATES_ROUTE, request.timestamp)?;
        self.fetch(
            endpoint,
            &[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("method", request.method.to_string()),
                ("school", request.school.to_string()),
            ],
        )
        .await
    }

    async fn timings_by_city(
        &self,
        city: &SavedCity,
        request: ProviderRequest,
    ) -> Result<ProviderTimings, ResolutionError> {
        let endpoint = self.endpoint(CITY_ROUTE, request.timestamp)?;
        self.fetch(
            endpoint,
            &[
                ("city", city.city.clone()),
                ("country", city.country.clone()),
                ("method", request.method.to_string()),
                ("school", request.school.to_string()),
            ],
        )
        .await
    }
}
