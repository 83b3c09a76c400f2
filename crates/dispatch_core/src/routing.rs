//! Pluggable routing oracles: trait abstraction for route providers.
//!
//! Implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`StraightLineProvider`**: Deterministic densified-segment estimate
//!   using the tortuosity multiplier and average-speed model. Zero
//!   dependencies, never fails.
//! - **`OsrmRouteProvider`** (feature `osrm`): Calls a local/remote OSRM
//!   HTTP endpoint.
//! - **`CachedRouteProvider`**: LRU-cached wrapper around any provider;
//!   inner failures fall back to the straight-line estimate so dispatch
//!   logic never blocks or errors on oracle unavailability.
//!
//! Providers are held as `Arc<dyn RouteProvider>`, constructed from
//! `RouteProviderKind` at wiring time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{self, GeoPoint};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Result of a route query between two coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Ordered lat/lng waypoints from origin to destination.
    pub geometry: Vec<GeoPoint>,
    /// Road-network distance in metres.
    pub distance_m: f64,
    /// Travel time in seconds.
    pub eta_secs: u64,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[cfg(feature = "osrm")]
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing backend returned no route")]
    NoRoute,
    #[error("malformed routing response: {0}")]
    Malformed(String),
}

/// Trait for routing backends. Implementations must be `Send + Sync` so the
/// provider can be shared across concurrent lifecycle tasks.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, RouteError>;
}

/// Which routing backend to use. Serializes into persisted parameter sets.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Deterministic straight-line estimate, zero external dependencies.
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

/// Deterministic fallback oracle: a densified interpolation of the direct
/// segment, with distance and ETA from the tortuosity/average-speed model.
#[derive(Clone, Debug)]
pub struct StraightLineProvider {
    /// Points in the produced geometry (>= 2); more points animate smoother.
    pub points: usize,
    pub speed_kmh: f64,
    pub tortuosity: f64,
}

impl Default for StraightLineProvider {
    fn default() -> Self {
        Self {
            points: 20,
            speed_kmh: geo::AVG_SPEED_KMH,
            tortuosity: geo::ROAD_TORTUOSITY,
        }
    }
}

impl StraightLineProvider {
    pub fn new(points: usize, speed_kmh: f64, tortuosity: f64) -> Self {
        Self {
            points: points.max(2),
            speed_kmh,
            tortuosity,
        }
    }

    /// Infallible synchronous estimate; the trait impl and the lifecycle
    /// fallback path both go through here.
    pub fn estimate(&self, from: GeoPoint, to: GeoPoint) -> RouteResult {
        let n = self.points.max(2);
        let geometry = (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                GeoPoint::new(
                    from.lat + (to.lat - from.lat) * t,
                    from.lng + (to.lng - from.lng) * t,
                )
            })
            .collect();
        let distance_m = geo::haversine_m(from, to) * self.tortuosity;
        let eta_secs = geo::eta_secs_at(distance_m, self.speed_kmh);
        RouteResult {
            geometry,
            distance_m,
            eta_secs,
        }
    }
}

#[async_trait]
impl RouteProvider for StraightLineProvider {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, RouteError> {
        Ok(self.estimate(from, to))
    }
}

// ---------------------------------------------------------------------------
// OSRM provider (behind `osrm` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
pub mod osrm {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Routes via an OSRM HTTP endpoint.
    pub struct OsrmRouteProvider {
        client: Client,
        endpoint: String,
    }

    impl OsrmRouteProvider {
        pub fn new(endpoint: &str) -> Result<Self, RouteError> {
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            })
        }
    }

    /// Minimal OSRM JSON response structures.
    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
        geometry: OsrmGeometry,
    }

    #[derive(Deserialize)]
    struct OsrmGeometry {
        coordinates: Vec<Vec<f64>>, // [lng, lat]
    }

    #[async_trait]
    impl RouteProvider for OsrmRouteProvider {
        async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, RouteError> {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
                self.endpoint, from.lng, from.lat, to.lng, to.lat,
            );

            let resp: OsrmResponse = self.client.get(&url).send().await?.json().await?;
            if resp.code != "Ok" {
                return Err(RouteError::Malformed(format!("OSRM code {}", resp.code)));
            }
            let route = resp
                .routes
                .and_then(|routes| routes.into_iter().next())
                .ok_or(RouteError::NoRoute)?;

            let geometry: Vec<GeoPoint> = route
                .geometry
                .coordinates
                .iter()
                .filter(|c| c.len() >= 2)
                .map(|c| GeoPoint::new(c[1], c[0])) // OSRM returns [lng, lat]
                .collect();
            if geometry.is_empty() {
                return Err(RouteError::Malformed("empty geometry".to_string()));
            }

            Ok(RouteResult {
                geometry,
                distance_m: route.distance,
                eta_secs: route.duration.round() as u64,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper with straight-line fallback
// ---------------------------------------------------------------------------

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

type RouteKey = ((i64, i64), (i64, i64));

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Cache key is the quantized `(from, to)` pair (directional). On cache miss
/// the inner provider is queried; on inner failure the straight-line estimate
/// is substituted (and logged as a warning) so callers never see an oracle
/// outage.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<RouteKey, RouteResult>>,
    fallback: Option<StraightLineProvider>,
}

impl CachedRouteProvider {
    pub fn new(
        inner: Box<dyn RouteProvider>,
        capacity: usize,
        fallback: Option<StraightLineProvider>,
    ) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("cache capacity must be > 0"),
            )),
            fallback,
        }
    }
}

#[async_trait]
impl RouteProvider for CachedRouteProvider {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, RouteError> {
        let key = (from.quantized(), to.quantized());

        // Fast path: cache hit. The guard must not be held across the await.
        if let Some(cached) = self.cache.lock().get(&key).cloned() {
            return Ok(cached);
        }

        let result = match self.inner.route(from, to).await {
            Ok(route) => Ok(route),
            Err(err) => match &self.fallback {
                Some(provider) => {
                    tracing::warn!(error = %err, "route provider failed, using straight-line fallback");
                    Ok(provider.estimate(from, to))
                }
                None => Err(err),
            },
        };

        if let Ok(route) = &result {
            self.cache.lock().put(key, route.clone());
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Construct a boxed [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
///
/// - `StraightLine` is returned bare (already fast and deterministic).
/// - `Osrm` is wrapped in a [`CachedRouteProvider`] with straight-line
///   fallback on failure.
pub fn build_route_provider(kind: &RouteProviderKind) -> Box<dyn RouteProvider> {
    match kind {
        RouteProviderKind::StraightLine => Box::new(StraightLineProvider::default()),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => match osrm::OsrmRouteProvider::new(endpoint) {
            Ok(provider) => Box::new(CachedRouteProvider::new(
                Box::new(provider),
                DEFAULT_ROUTE_CACHE_CAPACITY,
                Some(StraightLineProvider::default()),
            )),
            Err(err) => {
                tracing::warn!(error = %err, "failed to build OSRM provider, using straight-line");
                Box::new(StraightLineProvider::default())
            }
        },
    }
}
