//! Middleware: session extraction, role guards, security headers, client info.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use simtaq_common::{error::SimtaqError, models::user::Role};
use std::{convert::Infallible, net::SocketAddr};

use crate::auth;

/// Authenticated session, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub name: String,
    pub role: Role,
}

/// Session token from the cookie, falling back to `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_name = &simtaq_common::config::get().auth.cookie_name;
    if let Some(cookie) = CookieJar::from_headers(headers).get(cookie_name) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Validate the session and insert [`AuthContext`] for handlers.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, SimtaqError> {
    let token = session_token(request.headers()).ok_or(SimtaqError::Unauthorized)?;

    let config = simtaq_common::config::get();
    let claims = auth::validate_token(&token, &config.auth.jwt_secret).map_err(auth::token_error)?;

    let auth_ctx = AuthContext {
        user_id: claims.user_id()?,
        username: claims.username,
        name: claims.name,
        role: claims.role,
    };

    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

fn require_roles(request: &Request, allowed: &[Role]) -> Result<(), SimtaqError> {
    let ctx = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(SimtaqError::Unauthorized)?;
    if !allowed.contains(&ctx.role) {
        return Err(SimtaqError::Forbidden);
    }
    Ok(())
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, SimtaqError> {
    require_roles(&request, &[Role::Admin])?;
    Ok(next.run(request).await)
}

pub async fn require_guru(request: Request, next: Next) -> Result<Response, SimtaqError> {
    require_roles(&request, &[Role::Guru])?;
    Ok(next.run(request).await)
}

pub async fn require_siswa(request: Request, next: Next) -> Result<Response, SimtaqError> {
    require_roles(&request, &[Role::Siswa])?;
    Ok(next.run(request).await)
}

pub async fn require_orang_tua(request: Request, next: Next) -> Result<Response, SimtaqError> {
    require_roles(&request, &[Role::OrangTua])?;
    Ok(next.run(request).await)
}

/// Caller address and user agent, recorded in the activity log and used in
/// rate-limit keys.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Proxy headers are only honoured with `trust_proxy`; otherwise the socket
    /// peer is the client. Behind a proxy the last `X-Forwarded-For` hop is the
    /// one the proxy appended, earlier hops are caller-controlled.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let proxied = trust_proxy
            .then(|| {
                let real_ip = headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                let forwarded = headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.rsplit(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                real_ip.or(forwarded).map(str::to_string)
            })
            .flatten();

        Self {
            ip: proxied.or_else(|| peer.map(|addr| addr.ip().to_string())),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    /// Address used in rate-limit keys.
    pub fn ip_or_unknown(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let trust_proxy = simtaq_common::config::get().server.trust_proxy;
        Ok(Self::resolve(&parts.headers, peer, trust_proxy))
    }
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert(axum::http::header::HeaderName::from_static($name), v);
            }
        };
    }

    set!("x-content-type-options", "nosniff");
    set!("x-frame-options", "SAMEORIGIN");
    set!("referrer-policy", "strict-origin-when-cross-origin");
    set!(
        "permissions-policy",
        "camera=(), microphone=(), geolocation=(), payment=()"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proxied_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("6.6.6.6, 10.0.0.7"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers
    }

    #[test]
    fn forwarded_headers_ignored_without_trusted_proxy() {
        let peer: SocketAddr = "203.0.113.9:51234".parse().unwrap();
        let info = ClientInfo::resolve(&proxied_headers(), Some(peer), false);
        assert_eq!(info.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));

        let mut rotated = proxied_headers();
        rotated.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(ClientInfo::resolve(&rotated, Some(peer), false).ip, info.ip);
    }

    #[test]
    fn trusted_proxy_uses_last_forwarded_hop() {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let info = ClientInfo::resolve(&proxied_headers(), Some(peer), true);
        assert_eq!(info.ip.as_deref(), Some("10.0.0.7"));

        let mut headers = proxied_headers();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.2"));
        assert_eq!(ClientInfo::resolve(&headers, Some(peer), true).ip.as_deref(), Some("192.168.1.2"));

        assert_eq!(ClientInfo::resolve(&HeaderMap::new(), Some(peer), true).ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ClientInfo::default().ip_or_unknown(), "unknown");
    }
}
