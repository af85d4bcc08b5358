//! Client address extraction.
//!
//! The first `X-Forwarded-For` hop is used only when the service is
//! configured to sit behind a trusted reverse proxy
//! (`server.trust_forwarded_for`). Otherwise, and when the header is absent,
//! the peer address from `ConnectInfo` is used, which requires serving with
//! `into_make_service_with_connect_info`.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef};
use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client IP as recorded in the audit trail, if known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

/// Whether `X-Forwarded-For` comes from a proxy we control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedProxy(pub bool);

/// Resolves the client address from proxy headers or the peer address.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    proxy: TrustedProxy,
) -> Option<String> {
    let forwarded = match proxy {
        TrustedProxy(true) => headers.get(FORWARDED_FOR),
        TrustedProxy(false) => None,
    };
    forwarded
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    TrustedProxy: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let proxy = TrustedProxy::from_ref(state);
        Box::pin(async move {
            let peer = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            Ok(ClientIp(client_ip(&parts.headers, peer, proxy)))
        })
    }
}
