//! Business logic services

pub mod circuit_breaker;
pub mod geo;
pub mod geocoding;
pub mod nominatim;
pub mod rate_limiter;
pub mod rest_stop;
pub mod retry;
pub mod routing;
