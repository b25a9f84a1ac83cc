use super::{ForwardQuery, Forwarder};
use crate::dns::context::ForwardContext;
use crate::dns::packet;
use ferrous_forward_domain::{ForwardError, ResolverAndDelay};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Tears the race down on every exit path, including the caller dropping the
/// forward future.
struct RaceGuard {
    query: Arc<ForwardQuery>,
    abort_handles: Vec<AbortHandle>,
}

impl Drop for RaceGuard {
    fn drop(&mut self) {
        self.query.finish();
        for handle in &self.abort_handles {
            handle.abort();
        }
    }
}

impl Forwarder {
    /// Forwards `raw_query` to the configured resolvers.
    ///
    /// The context deadline is tightened to the configured query timeout.
    pub async fn forward(
        &self,
        ctx: &ForwardContext,
        raw_query: &[u8],
    ) -> Result<Vec<u8>, ForwardError> {
        if self.inner.resolvers.is_empty() {
            return Err(ForwardError::NoResolvers);
        }
        let ctx = ctx.clone().with_timeout(self.inner.settings.query_timeout);
        self.forward_with_plan(&ctx, raw_query, self.plan()).await
    }

    pub async fn forward_with_plan(
        &self,
        ctx: &ForwardContext,
        raw_query: &[u8],
        plan: Vec<ResolverAndDelay>,
    ) -> Result<Vec<u8>, ForwardError> {
        let query = Arc::new(ForwardQuery::new(raw_query.to_vec())?);
        self.race(ctx, query, plan).await
    }

    /// Races every candidate of `plan` for `query`. The query is finished,
    /// and its pool closed, before this returns.
    pub async fn race(
        &self,
        ctx: &ForwardContext,
        query: Arc<ForwardQuery>,
        plan: Vec<ResolverAndDelay>,
    ) -> Result<Vec<u8>, ForwardError> {
        let mut guard = RaceGuard {
            query: Arc::clone(&query),
            abort_handles: Vec::with_capacity(plan.len()),
        };

        if plan.is_empty() {
            return Err(ForwardError::NoResolvers);
        }
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        debug!(
            txid = query.txid(),
            candidates = plan.len(),
            name = ?packet::question_name(query.packet()),
            "Racing upstream candidates"
        );

        let mut futs = FuturesUnordered::new();
        for candidate in plan {
            let forwarder = self.clone();
            let ctx = ctx.clone();
            let query = Arc::clone(&query);
            let handle = tokio::spawn(async move {
                let result = forwarder.run_candidate(&ctx, &query, &candidate).await;
                (candidate, result)
            });
            guard.abort_handles.push(handle.abort_handle());
            futs.push(handle);
        }

        let mut first_err: Option<ForwardError> = None;
        loop {
            tokio::select! {
                biased;
                joined = futs.next() => match joined {
                    Some(Ok((candidate, Ok(response)))) => {
                        if let Err(e) = check_txid(&query, &response) {
                            first_err.get_or_insert(e);
                            continue;
                        }
                        debug!(
                            resolver = %candidate.resolver,
                            txid = query.txid(),
                            "Fastest response"
                        );
                        return Ok(response);
                    }
                    Some(Ok((_, Err(e)))) => {
                        if !e.is_cancellation() && first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Forward attempt task panicked");
                    }
                    None => return all_failed(&query, first_err, ctx),
                },
                err = ctx.done() => {
                    return match (err, first_err) {
                        (ForwardError::DeadlineExceeded, Some(first)) => {
                            Err(ForwardError::AllCandidatesFailed(Box::new(first)))
                        }
                        (err, _) => Err(err),
                    };
                }
            }
        }
    }

    async fn run_candidate(
        &self,
        ctx: &ForwardContext,
        query: &ForwardQuery,
        candidate: &ResolverAndDelay,
    ) -> Result<Vec<u8>, ForwardError> {
        if !candidate.start_delay.is_zero() {
            tokio::select! {
                biased;
                _ = query.finished() => return Err(ForwardError::Cancelled),
                err = ctx.done() => return Err(err),
                _ = tokio::time::sleep(candidate.start_delay) => {}
            }
        }
        if query.is_finished() {
            return Err(ForwardError::Cancelled);
        }
        self.send(ctx, query, candidate).await
    }
}

fn check_txid(query: &ForwardQuery, response: &[u8]) -> Result<(), ForwardError> {
    let got = packet::transaction_id(response)?;
    if got != query.txid() {
        return Err(ForwardError::TransactionMismatch {
            expected: query.txid(),
            got,
        });
    }
    Ok(())
}

fn all_failed(
    query: &ForwardQuery,
    first_err: Option<ForwardError>,
    ctx: &ForwardContext,
) -> Result<Vec<u8>, ForwardError> {
    let Some(first) = first_err else {
        return Err(ctx.err().unwrap_or(ForwardError::Cancelled));
    };

    if matches!(first, ForwardError::ServerFailure { .. }) {
        if let Some(response) = packet::servfail_response(query.packet()) {
            debug!(txid = query.txid(), "All upstreams failed, answering SERVFAIL");
            return Ok(response);
        }
    }

    Err(ForwardError::AllCandidatesFailed(Box::new(first)))
}
