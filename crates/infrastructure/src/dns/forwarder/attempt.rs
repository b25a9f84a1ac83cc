use super::{ForwardQuery, Forwarder};
use crate::dns::context::ForwardContext;
use crate::dns::packet::{self, RCODE_SERVFAIL};
use crate::dns::providers::doh_client_for;
use crate::dns::transport::{https, tcp, udp, UdpReply};
use ferrous_forward_domain::{ForwardError, ResolverAndDelay, ResolverSpec};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Forwarder {
    /// Sends `query` to one candidate and returns its raw response.
    ///
    /// Plain resolvers are tried over UDP first and retried once over TCP when
    /// the UDP answer is truncated. The attempt stops as soon as `ctx` is done
    /// or the query finishes, and every socket it opened is closed on return.
    pub async fn send(
        &self,
        ctx: &ForwardContext,
        query: &ForwardQuery,
        candidate: &ResolverAndDelay,
    ) -> Result<Vec<u8>, ForwardError> {
        let resolver = &candidate.resolver;
        let debug_send = self.inner.settings.debug_send;

        if debug_send {
            info!(
                resolver = %resolver,
                txid = query.txid(),
                name = ?packet::question_name(query.packet()),
                "Forward send"
            );
        }

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = query.finished() => Err(ForwardError::Cancelled),
            err = ctx.done() => Err(err),
            result = self.send_to(query, resolver) => result,
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                resolver = %resolver,
                txid = query.txid(),
                response_len = response.len(),
                latency_ms,
                "Forward attempt succeeded"
            ),
            Err(e) if e.is_cancellation() => debug!(
                resolver = %resolver,
                txid = query.txid(),
                error = %e,
                "Forward attempt stopped"
            ),
            Err(e) if debug_send => warn!(
                resolver = %resolver,
                txid = query.txid(),
                name = ?packet::question_name(query.packet()),
                error = %e,
                latency_ms,
                "Forward send failed"
            ),
            Err(e) => debug!(
                resolver = %resolver,
                txid = query.txid(),
                error = %e,
                latency_ms,
                "Forward attempt failed"
            ),
        }

        result
    }

    async fn send_to(
        &self,
        query: &ForwardQuery,
        resolver: &ResolverSpec,
    ) -> Result<Vec<u8>, ForwardError> {
        match resolver {
            ResolverSpec::Plain { addr } => self.send_plain(query, *addr).await,
            ResolverSpec::Https { url } => self.send_doh(query, url).await,
        }
    }

    async fn send_plain(
        &self,
        query: &ForwardQuery,
        server: SocketAddr,
    ) -> Result<Vec<u8>, ForwardError> {
        match self.send_udp(query, server).await? {
            UdpReply::Answer(mut response) => {
                check_rcode(server, &response)?;
                packet::clamp_edns_size(&mut response, self.inner.settings.max_udp_response_bytes);
                Ok(response)
            }
            UdpReply::Truncated => {
                debug!(server = %server, txid = query.txid(), "UDP response truncated, retrying over TCP");
                let response = self.send_tcp(query, server).await?;
                check_rcode(server, &response)?;
                Ok(response)
            }
        }
    }

    async fn send_udp(
        &self,
        query: &ForwardQuery,
        server: SocketAddr,
    ) -> Result<UdpReply, ForwardError> {
        let (closed, _registration) = query.register();
        let max_response_bytes = self.inner.settings.max_udp_response_bytes as usize;

        until_closed(&closed, async {
            let socket = self
                .inner
                .dialer
                .dial_udp(server)
                .await
                .map_err(|e| ForwardError::transport(server, format!("UDP dial failed: {}", e)))?;
            udp::exchange(&socket, server, query.packet(), max_response_bytes).await
        })
        .await
    }

    async fn send_tcp(&self, query: &ForwardQuery, server: SocketAddr) -> Result<Vec<u8>, ForwardError> {
        let (closed, _registration) = query.register();

        until_closed(&closed, async {
            let mut stream = self
                .inner
                .dialer
                .dial_tcp(server)
                .await
                .map_err(|e| ForwardError::transport(server, format!("TCP dial failed: {}", e)))?;
            tcp::exchange(&mut stream, server, query.packet()).await
        })
        .await
    }

    async fn send_doh(&self, query: &ForwardQuery, url: &str) -> Result<Vec<u8>, ForwardError> {
        let client = doh_client_for(url);
        let (closed, _registration) = query.register();

        let response = until_closed(&closed, https::exchange(&client, url, query.packet())).await?;
        check_rcode(url, &response)?;
        Ok(response)
    }
}

/// Runs `io` until it completes or `closed` fires. The future, and any
/// socket it owns, is dropped before this returns.
async fn until_closed<T, F>(closed: &CancellationToken, io: F) -> Result<T, ForwardError>
where
    F: Future<Output = Result<T, ForwardError>>,
{
    tokio::select! {
        biased;
        _ = closed.cancelled() => Err(ForwardError::Cancelled),
        result = io => result,
    }
}

fn check_rcode(server: impl ToString, response: &[u8]) -> Result<(), ForwardError> {
    if packet::response_code(response) == RCODE_SERVFAIL {
        return Err(ForwardError::ServerFailure {
            server: server.to_string(),
        });
    }
    Ok(())
}
