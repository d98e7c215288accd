//! Rate limiting for credential endpoints using governor and `tower_governor`.
//!
//! Login, registration and password-reset requests are limited per client IP
//! to slow down credential stuffing and reset-email floods.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Client IP for rate limiting.
///
/// Proxy headers are client-controlled unless a proxy in front rewrites
/// them, so they are read only when `trust_proxy_headers` is set. Otherwise
/// the socket peer is the key. Requests with neither (in-process tests)
/// share one bucket.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl ClientIpKeyExtractor {
    fn proxied_ip<T>(&self, req: &Request<T>) -> Option<IpAddr> {
        if !self.trust_proxy_headers {
            return None;
        }
        header_ip(req, "fly-client-ip")
            .or_else(|| header_ip(req, "x-forwarded-for"))
            .or_else(|| header_ip(req, "x-real-ip"))
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let ip = self
            .proxied_ip(req)
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        Ok(ip)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Credential endpoints: one request every 6 seconds per IP, burst of 5.
///
/// # Panics
///
/// Never in practice: both settings are positive constants.
#[must_use]
pub fn auth_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor {
            trust_proxy_headers,
        })
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const BEHIND_PROXY: ClientIpKeyExtractor = ClientIpKeyExtractor {
        trust_proxy_headers: true,
    };
    const DIRECT: ClientIpKeyExtractor = ClientIpKeyExtractor {
        trust_proxy_headers: false,
    };

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    fn from_peer(headers: &[(&str, &str)]) -> Request<()> {
        let mut req = request(headers);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4242))));
        req
    }

    #[test]
    fn test_first_forwarded_ip_is_used_behind_proxy() {
        let req = request(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(
            BEHIND_PROXY.extract(&req).unwrap(),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_fly_header_wins_behind_proxy() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.9"),
            ("fly-client-ip", "198.51.100.4"),
        ]);
        assert_eq!(
            BEHIND_PROXY.extract(&req).unwrap(),
            "198.51.100.4".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_rotating_headers_do_not_change_direct_key() {
        let peer = IpAddr::from([192, 0, 2, 1]);
        for spoofed in ["203.0.113.9", "203.0.113.10", "198.51.100.4"] {
            let req = from_peer(&[
                ("x-forwarded-for", spoofed),
                ("x-real-ip", spoofed),
                ("fly-client-ip", spoofed),
            ]);
            assert_eq!(DIRECT.extract(&req).unwrap(), peer);
        }
    }

    #[test]
    fn test_peer_address_is_the_fallback() {
        let req = from_peer(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(
            BEHIND_PROXY.extract(&req).unwrap(),
            IpAddr::from([192, 0, 2, 1])
        );
        assert_eq!(
            DIRECT.extract(&request(&[])).unwrap(),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }
}
