//! Single-host reverse-proxy mechanics: rewrite the request for one upstream,
//! send it, and hand back the upstream response.

use std::net::IpAddr;

use http::header::{CONNECTION, TE, UPGRADE};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Uri, Version};
use http_body_util::BodyExt;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tracing::{debug, warn};

use crate::common::error::ForwardingError;
use crate::common::types::{ClientAddr, ProxyBody};
use crate::proxy::backend::UpstreamClient;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

// Connection-scoped headers that must not be passed through a proxy.
const HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub async fn forward(
    client: &UpstreamClient,
    upstream: &Uri,
    mut req: Request<ProxyBody>,
) -> Result<Response<ProxyBody>, ForwardingError> {
    let upgrade = upgrade_type(req.headers());

    *req.uri_mut() = upstream_uri(upstream, req.uri())?;
    *req.version_mut() = Version::HTTP_11;

    rewrite_request_headers(req.headers_mut(), upgrade.as_ref());
    if let Some(ClientAddr(addr)) = req.extensions().get::<ClientAddr>().copied() {
        append_forwarded_for(req.headers_mut(), addr.ip());
    }

    let inbound = upgrade.as_ref().map(|_| hyper::upgrade::on(&mut req));

    let mut resp = client.request(req).await?;

    match inbound {
        Some(inbound) if resp.status() == StatusCode::SWITCHING_PROTOCOLS => {
            let outbound = hyper::upgrade::on(&mut resp);
            tokio::spawn(tunnel(inbound, outbound));
        }
        _ => remove_hop_headers(resp.headers_mut()),
    }

    Ok(resp.map(|b| b.boxed()))
}

/// Joins the upstream base with the inbound path and query.
pub fn upstream_uri(upstream: &Uri, inbound: &Uri) -> Result<Uri, http::Error> {
    let path = join_paths(upstream.path(), inbound.path());
    let path_and_query = match (upstream.query(), inbound.query()) {
        (Some(base), Some(query)) => format!("{}?{}&{}", path, base, query),
        (Some(query), None) | (None, Some(query)) => format!("{}?{}", path, query),
        (None, None) => path,
    };

    Uri::builder()
        .scheme(upstream.scheme_str().unwrap_or("http"))
        .authority(upstream.authority().map_or("", |a| a.as_str()))
        .path_and_query(path_and_query)
        .build()
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn upgrade_type(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .any(|value| has_token(value, "upgrade"));
    if !wants_upgrade {
        return None;
    }
    headers.get(UPGRADE).cloned()
}

fn has_token(value: &HeaderValue, token: &str) -> bool {
    value
        .to_str()
        .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
        .unwrap_or(false)
}

// Hop-by-hop headers go, except `TE: trailers` and the upgrade handshake.
fn rewrite_request_headers(headers: &mut HeaderMap, upgrade: Option<&HeaderValue>) {
    let wants_trailers = headers
        .get_all(TE)
        .iter()
        .any(|value| has_token(value, "trailers"));

    remove_hop_headers(headers);

    if wants_trailers {
        headers.insert(TE, HeaderValue::from_static("trailers"));
    }
    if let Some(protocol) = upgrade {
        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(UPGRADE, protocol.clone());
    }
}

fn remove_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

// Splice the client and upstream connections once both sides have switched protocols.
async fn tunnel(inbound: OnUpgrade, outbound: OnUpgrade) {
    let (client, server) = match tokio::try_join!(inbound, outbound) {
        Ok(pair) => pair,
        Err(e) => {
            warn!("upgrade error: {}", e);
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut server = TokioIo::new(server);

    match tokio::io::copy_bidirectional(&mut client, &mut server).await {
        Ok((from_client, from_server)) => debug!(
            "Client wrote {} bytes and received {} bytes",
            from_client, from_server
        ),
        Err(e) => warn!("tunnel io error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn rewrites_to_upstream_authority() {
        let out = upstream_uri(&uri("http://10.0.0.1:8080"), &uri("/users/7?x=1")).unwrap();
        assert_eq!(out, "http://10.0.0.1:8080/users/7?x=1");
    }

    #[test]
    fn joins_base_path_with_single_slash() {
        let out = upstream_uri(&uri("http://up/api/"), &uri("/users")).unwrap();
        assert_eq!(out, "http://up/api/users");

        let out = upstream_uri(&uri("http://up/api"), &uri("/users")).unwrap();
        assert_eq!(out, "http://up/api/users");
    }

    #[test]
    fn merges_queries() {
        let out = upstream_uri(&uri("http://up/?key=abc"), &uri("/q?page=2")).unwrap();
        assert_eq!(out, "http://up/q?key=abc&page=2");
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        remove_hop_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["accept"], "*/*");
    }

    #[test]
    fn keeps_te_trailers_on_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(TE, HeaderValue::from_static("trailers, deflate"));
        headers.insert(CONNECTION, HeaderValue::from_static("TE"));

        rewrite_request_headers(&mut headers, None);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[TE], "trailers");

        let mut headers = HeaderMap::new();
        headers.insert(TE, HeaderValue::from_static("gzip"));
        rewrite_request_headers(&mut headers, None);
        assert!(headers.get(TE).is_none());
    }

    #[test]
    fn upgrade_handshake_survives_rewrite() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        let upgrade = upgrade_type(&headers);

        rewrite_request_headers(&mut headers, upgrade.as_ref());

        assert_eq!(headers[CONNECTION], "upgrade");
        assert_eq!(headers[UPGRADE], "websocket");
    }

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        assert_eq!(upgrade_type(&headers), None);

        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert_eq!(upgrade_type(&headers).unwrap(), "websocket");
    }

    #[test]
    fn appends_client_ip_to_forwarded_for() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.1.1.1".parse().unwrap());
        assert_eq!(headers[&X_FORWARDED_FOR], "10.1.1.1");

        append_forwarded_for(&mut headers, "192.168.0.9".parse().unwrap());
        assert_eq!(headers[&X_FORWARDED_FOR], "10.1.1.1, 192.168.0.9");
    }
}
