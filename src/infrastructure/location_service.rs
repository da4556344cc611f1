use crate::domain::models::GeoCoordinates;
use crate::infrastructure::error::ResolutionError;
use async_trait::async_trait;

pub const LOCATION_UNSUPPORTED_MESSAGE: &str = "Geolocation not supported";

/// Source of the device position used in GPS mode.
#[async_trait]
pub trait LocationService: Send + Sync {
    async fn current_position(&self) -> Result<GeoCoordinates, ResolutionError>;
}

/// Reads the position from configuration (`deviceLocation` or the
/// `ALRUA_LATITUDE`/`ALRUA_LONGITUDE` overrides). Hosts without a configured
/// position behave like a device without geolocation support.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocationService {
    position: Option<GeoCoordinates>,
}

impl ConfiguredLocationService {
    pub fn new(position: Option<GeoCoordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationService for ConfiguredLocationService {
    async fn current_position(&self) -> Result<GeoCoordinates, ResolutionError> {
        let position = self.position.ok_or_else(|| {
            ResolutionError::LocationUnavailable(LOCATION_UNSUPPORTED_MESSAGE.to_string())
        })?;
        position
            .validate()
            .map_err(ResolutionError::LocationUnavailable)?;
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configured_position_is_returned() {
        let cairo = GeoCoordinates {
            latitude: 30.0444,
            longitude: 31.2357,
        };
        let service = ConfiguredLocationService::new(Some(cairo));
        assert_eq!(service.current_position().await, Ok(cairo));
    }

    #[tokio::test]
    async fn missing_position_reports_unsupported() {
        let service = ConfiguredLocationService::default();
        assert_eq!(
            service.current_position().await,
            Err(ResolutionError::LocationUnavailable(
                "Geolocation not supported".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn out_of_range_position_is_unavailable() {
        let service = ConfiguredLocationService::new(Some(GeoCoordinates {
            latitude: 123.0,
            longitude: 0.0,
        }));
        assert!(matches!(
            service.current_position().await,
            Err(ResolutionError::LocationUnavailable(_))
        ));
    }
}
