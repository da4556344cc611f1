use crate::domain::models::{
    CalculationMethod, JurisprudenceSchool, LocationQuery, TimingSet,
};
use crate::infrastructure::error::ResolutionError;
use crate::infrastructure::timing_provider_client::{ProviderRequest, TimingProviderClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const CITY_REJECTED_MESSAGE: &str = "Location not found";
const COORDINATES_REJECTED_MESSAGE: &str = "Failed to fetch data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTimings {
    pub timings: TimingSet,
    pub time_zone: String,
    pub location_label: String,
}

/// Turns a location and a calculation convention into one day of timings.
/// Stateless apart from the injected clock; every call is a single provider
/// request with no retry.
pub struct TimingResolver<C>
where
    C: TimingProviderClient,
{
    provider_client: Arc<C>,
    now_provider: NowProvider,
}

impl<C> TimingResolver<C>
where
    C: TimingProviderClient,
{
    pub fn new(provider_client: Arc<C>) -> Self {
        Self {
            provider_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn resolve(
        &self,
        location: &LocationQuery,
        method: CalculationMethod,
        school: JurisprudenceSchool,
    ) -> Result<ResolvedTimings, ResolutionError> {
        let policy = method.policy();
        let request = ProviderRequest {
            timestamp: (self.now_provider)().timestamp(),
            method: policy.provider_method_id,
            school: school.id(),
        };
        tracing::debug!(
            mode = location.mode().as_str(),
            method = method.id(),
            provider_method = request.method,
            school = request.school,
            "requesting timings"
        );

        let (response, location_label) = match location {
            LocationQuery::Coordinates(coordinates) => {
                let response = self
                    .provider_client
                    .timings_by_coordinates(*coordinates, request)
                    .await
                    .map_err(|error| relabel_rejection(error, COORDINATES_REJECTED_MESSAGE))?;
                let label = zone_label(&response.time_zone);
                (response, label)
            }
            LocationQuery::City(city) => {
                let response = self
                    .provider_client
                    .timings_by_city(city, request)
                    .await
                    .map_err(|error| relabel_rejection(error, CITY_REJECTED_MESSAGE))?;
                (response, city.label())
            }
        };

        let timings = policy.apply(response.timings);
        if let Err(violation) = timings.validate() {
            tracing::warn!(
                time_zone = %response.time_zone,
                %violation,
                "provider timings are out of order"
            );
        }

        Ok(ResolvedTimings {
            timings,
            time_zone: response.time_zone,
            location_label,
        })
    }
}

fn relabel_rejection(error: ResolutionError, message: &str) -> ResolutionError {
    match error {
        ResolutionError::ProviderRejected { code, message: detail } => {
            tracing::warn!(code, %detail, "timing provider rejected request");
            ResolutionError::ProviderRejected {
                code,
                message: message.to_string(),
            }
        }
        other => other,
    }
}

/// Human name for a GPS location, taken from the provider zone:
/// "America/New_York" becomes "New York".
pub fn zone_label(time_zone: &str) -> String {
    time_zone
        .rsplit('/')
        .next()
        .unwrap_or(time_zone)
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GeoCoordinates, SavedCity};
    use crate::infrastructure::timing_provider_client::ProviderTimings;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Coordinates(GeoCoordinates, ProviderRequest),
        City(SavedCity, ProviderRequest),
    }

    struct FakeProvider {
        response: Result<ProviderTimings, ResolutionError>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeProvider {
        fn returning(response: Result<ProviderTimings, ResolutionError>) -> Self {
            Self {
                response,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl TimingProviderClient for FakeProvider {
        async fn timings_by_coordinates(
            &self,
            coordinates: GeoCoordinates,
            request: ProviderRequest,
        ) -> Result<ProviderTimings, ResolutionError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::Coordinates(coordinates, request));
            self.response.clone()
        }

        async fn timings_by_city(
            &self,
            city: &SavedCity,
            request: ProviderRequest,
        ) -> Result<ProviderTimings, ResolutionError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::City(city.clone(), request));
            self.response.clone()
        }
    }

    fn clock(value: &str) -> crate::domain::clock::ClockTime {
        value.parse().expect("valid clock time")
    }

    fn provider_timings(time_zone: &str) -> ProviderTimings {
        ProviderTimings {
            timings: TimingSet {
                imsak: clock("05:00"),
                fajr: clock("05:10"),
                sunrise: clock("06:35"),
                dhuhr: clock("12:05"),
                asr: clock("15:20"),
                maghrib: clock("17:40"),
                isha: clock("19:00"),
            },
            time_zone: time_zone.to_string(),
        }
    }

    fn fixed_now() -> NowProvider {
        Arc::new(|| {
            DateTime::parse_from_rfc3339("2026-02-18T12:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc)
        })
    }

    fn cairo() -> GeoCoordinates {
        GeoCoordinates {
            latitude: 30.0444,
            longitude: 31.2357,
        }
    }

    #[tokio::test]
    async fn seventeen_degree_method_sends_base_id_and_shifts_fajr() {
        let provider = Arc::new(FakeProvider::returning(Ok(provider_timings("Africa/Cairo"))));
        let resolver = TimingResolver::new(Arc::clone(&provider)).with_now_provider(fixed_now());

        let resolved = resolver
            .resolve(
                &LocationQuery::Coordinates(cairo()),
                CalculationMethod::SeventeenDegree,
                JurisprudenceSchool::Hanafi,
            )
            .await
            .expect("resolved");

        assert_eq!(resolved.timings.imsak.to_string(), "05:10");
        assert_eq!(resolved.timings.fajr.to_string(), "05:15");
        assert_eq!(resolved.timings.dhuhr.to_string(), "12:05");
        assert_eq!(
            provider.calls(),
            vec![Call::Coordinates(
                cairo(),
                ProviderRequest {
                    timestamp: 1_771_416_000,
                    method: 1,
                    school: 1,
                }
            )]
        );
    }

    #[tokio::test]
    async fn native_method_passes_timings_through() {
        let provider = Arc::new(FakeProvider::returning(Ok(provider_timings("Asia/Riyadh"))));
        let resolver = TimingResolver::new(Arc::clone(&provider)).with_now_provider(fixed_now());

        let resolved = resolver
            .resolve(
                &LocationQuery::City(SavedCity::new("Mecca", "Saudi Arabia")),
                CalculationMethod::Native(4),
                JurisprudenceSchool::Standard,
            )
            .await
            .expect("resolved");

        assert_eq!(resolved.timings, provider_timings("Asia/Riyadh").timings);
        assert_eq!(resolved.location_label, "Mecca, Saudi Arabia");
        assert!(matches!(
            provider.calls().as_slice(),
            [Call::City(_, ProviderRequest { method: 4, school: 0, .. })]
        ));
    }

    #[tokio::test]
    async fn gps_label_comes_from_time_zone() {
        let provider = Arc::new(FakeProvider::returning(Ok(provider_timings("America/New_York"))));
        let resolver = TimingResolver::new(provider);

        let resolved = resolver
            .resolve(
                &LocationQuery::Coordinates(cairo()),
                CalculationMethod::Native(2),
                JurisprudenceSchool::Standard,
            )
            .await
            .expect("resolved");

        assert_eq!(resolved.location_label, "New York");
        assert_eq!(resolved.time_zone, "America/New_York");
    }

    #[tokio::test]
    async fn rejections_carry_lookup_specific_messages() {
        let rejected = Err(ResolutionError::ProviderRejected {
            code: 400,
            message: "Unable to find city".to_string(),
        });
        let resolver = TimingResolver::new(Arc::new(FakeProvider::returning(rejected)));

        let city_error = resolver
            .resolve(
                &LocationQuery::City(SavedCity::new("Atlantis", "Nowhere")),
                CalculationMethod::SeventeenDegree,
                JurisprudenceSchool::Hanafi,
            )
            .await
            .expect_err("city rejected");
        let gps_error = resolver
            .resolve(
                &LocationQuery::Coordinates(cairo()),
                CalculationMethod::SeventeenDegree,
                JurisprudenceSchool::Hanafi,
            )
            .await
            .expect_err("gps rejected");

        assert_eq!(city_error.to_string(), "Location not found");
        assert_eq!(gps_error.to_string(), "Failed to fetch data");
        assert!(matches!(gps_error, ResolutionError::ProviderRejected { code: 400, .. }));
    }

    #[tokio::test]
    async fn network_errors_are_not_relabelled() {
        let resolver = TimingResolver::new(Arc::new(FakeProvider::returning(Err(
            ResolutionError::NetworkError("Network Error".to_string()),
        ))));

        let error = resolver
            .resolve(
                &LocationQuery::Coordinates(cairo()),
                CalculationMethod::Native(3),
                JurisprudenceSchool::Standard,
            )
            .await
            .expect_err("network failure");

        assert_eq!(error, ResolutionError::NetworkError("Network Error".to_string()));
    }

    #[test]
    fn zone_label_handles_nested_and_flat_zones() {
        assert_eq!(zone_label("America/Argentina/Buenos_Aires"), "Buenos Aires");
        assert_eq!(zone_label("UTC"), "UTC");
    }
}
