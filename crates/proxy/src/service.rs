use async_trait::async_trait;
use bytes::Bytes;
use malblock_admin::SharedStateType as SharedState;
use malblock_classifier::RequestAttributes;
use malblock_common::IdentityConfig;
use pingora_core::prelude::*;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use std::net::IpAddr;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::gate::{
    GateOutcome, RequestGate, BLOCKED_BODY, BLOCKED_HEADER, BLOCKED_HEADER_VALUE, BLOCKED_STATUS,
};
use crate::upstream::UpstreamSelector;

pub struct MalblockProxy {
    pub gate: RequestGate,
    pub upstream: UpstreamSelector,
    pub identity: IdentityConfig,
    pub state: SharedState,
}

impl MalblockProxy {
    pub fn new(gate: RequestGate, state: SharedState) -> Self {
        let upstream = UpstreamSelector::from_config(&state.config.upstream);
        info!(
            upstream = %upstream.name,
            servers = upstream.server_count(),
            "upstream group configured"
        );

        Self {
            gate,
            upstream,
            identity: state.config.identity.clone(),
            state,
        }
    }

    async fn reject(&self, session: &mut Session) -> Result<()> {
        let mut resp = ResponseHeader::build(BLOCKED_STATUS, Some(3))?;
        resp.insert_header(BLOCKED_HEADER, BLOCKED_HEADER_VALUE)?;
        resp.insert_header("content-type", "text/plain")?;
        resp.insert_header("content-length", BLOCKED_BODY.len().to_string())?;
        session.set_keepalive(None);
        session.write_response_header(Box::new(resp), false).await?;
        session
            .write_response_body(Some(Bytes::from_static(BLOCKED_BODY.as_bytes())), true)
            .await?;
        Ok(())
    }
}

/// Resolve the caller identity from the trusted header, or from the socket
/// peer when allowed. Returns an empty string when neither is available.
pub fn resolve_identity(
    header_value: Option<&str>,
    peer: Option<IpAddr>,
    config: &IdentityConfig,
) -> String {
    let from_header = header_value
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (from_header, peer) {
        (Some(identity), _) => identity.to_string(),
        (None, Some(peer)) if config.fallback_to_peer_addr => peer.to_string(),
        _ => String::new(),
    }
}

/// Copy the parts of a request the classifier looks at.
pub fn request_attributes(identity: &str, header: &RequestHeader) -> RequestAttributes {
    let mut attrs = RequestAttributes::new(identity);
    attrs.headers = header
        .headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    attrs.query = header.uri.query().map(str::to_string);
    attrs
}

#[async_trait]
impl ProxyHttp for MalblockProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        self.state.metrics.requests_total.inc();

        let header = session.req_header();
        ctx.method = header.method.as_str().to_string();
        ctx.uri = header
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        let header_value = header
            .headers
            .get(self.identity.header.as_str())
            .and_then(|v| v.to_str().ok());
        let peer = session
            .client_addr()
            .and_then(|a| a.as_inet())
            .map(|a| a.ip());
        ctx.identity = resolve_identity(header_value, peer, &self.identity);

        let attrs = request_attributes(&ctx.identity, session.req_header());
        let outcome = self.gate.evaluate(&attrs);
        ctx.category = Some(outcome.category());
        self.state.metrics.record_classification(outcome.category());

        match outcome {
            GateOutcome::Reject { category } => {
                info!(identity = %ctx.identity, %category, "request rejected for blocked identity");
                ctx.rejected = true;
                ctx.response_status = BLOCKED_STATUS.as_u16();
                self.state.metrics.requests_blocked.inc();
                self.reject(session).await?;
                Ok(true)
            }
            GateOutcome::Allow { .. } => Ok(false),
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let addr = self
            .upstream
            .select()
            .ok_or_else(|| Error::new(ErrorType::ConnectProxyFailure))?;

        debug!(upstream = %self.upstream.name, addr, "selected upstream peer");

        let peer = HttpPeer::new(addr, false, String::new());
        Ok(Box::new(peer))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if !ctx.identity.is_empty() {
            upstream_request.insert_header("x-real-ip", ctx.identity.as_str())?;
        }
        Ok(())
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        ctx.response_status = upstream_response.status.as_u16();
        Ok(())
    }

    async fn logging(
        &self,
        _session: &mut Session,
        _error: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let duration = ctx.request_start.elapsed();
        info!(
            identity = %ctx.identity,
            method = %ctx.method,
            uri = %ctx.uri,
            status = ctx.response_status,
            duration_ms = duration.as_millis() as u64,
            category = ctx.category.map(|c| c.as_label()),
            rejected = ctx.rejected,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use malblock_common::Category;

    fn identity_config(fallback: bool) -> IdentityConfig {
        IdentityConfig {
            header: "x-real-ip".to_string(),
            fallback_to_peer_addr: fallback,
        }
    }

    #[test]
    fn test_identity_from_header() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let identity = resolve_identity(Some(" 203.0.113.7 "), Some(peer), &identity_config(true));
        assert_eq!(identity, "203.0.113.7");
    }

    #[test]
    fn test_identity_takes_first_forwarded_hop() {
        let identity =
            resolve_identity(Some("203.0.113.7, 10.0.0.1"), None, &identity_config(false));
        assert_eq!(identity, "203.0.113.7");
    }

    #[test]
    fn test_identity_peer_fallback() {
        let peer: IpAddr = "198.51.100.3".parse().unwrap();
        assert_eq!(
            resolve_identity(None, Some(peer), &identity_config(true)),
            "198.51.100.3"
        );
        assert_eq!(resolve_identity(Some(""), Some(peer), &identity_config(false)), "");
    }

    #[test]
    fn test_request_attributes_from_header() {
        let mut header = RequestHeader::build("GET", b"/login?login=admin&x=1", None).unwrap();
        header.insert_header("User-Agent", "curl/8.0").unwrap();

        let attrs = request_attributes("203.0.113.7", &header);
        assert_eq!(attrs.identity, "203.0.113.7");
        assert_eq!(attrs.user_agent(), "curl/8.0");
        assert_eq!(attrs.query_param("login").as_deref(), Some("admin"));

        let classifier = malblock_classifier::Classifier::default();
        assert_eq!(classifier.classify(&attrs), Category::AuthEnumeration);
    }
}
