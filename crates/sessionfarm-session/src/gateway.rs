//! Request edge: keeps the client's session id pointed at this node.
//!
//! When a lookup re-homes a session (or replaces an unknown one), the id the
//! client sent no longer matches. The gateway tells the host to send the new
//! id back so the load balancer pins the client to this node.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::manager::{Resolved, SessionLifecycleParticipant};
use crate::session::Session;

/// The slice of the host's request/response the gateway needs.
pub trait RequestContext {
    /// Session id carried by the incoming request, if any.
    fn current_request_session_id(&self) -> Option<&str>;

    /// Make the response carry `new_id` (cookie, URL rewrite, ...).
    fn rewrite_outgoing_id(&mut self, session: &Session, new_id: &str);
}

/// Result of [`RouteRewriteGateway::handle`].
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    pub resolved: Resolved,
    /// Whether the outgoing id was rewritten.
    pub rewritten: bool,
}

/// Normalizes incoming session ids to the local route.
pub struct RouteRewriteGateway {
    participant: Arc<dyn SessionLifecycleParticipant>,
}

impl RouteRewriteGateway {
    pub fn new(participant: Arc<dyn SessionLifecycleParticipant>) -> Self {
        Self { participant }
    }

    /// Resolve the request's session and rewrite the outgoing id if it changed.
    ///
    /// Requests without a session id pass through untouched (`Ok(None)`).
    pub fn handle<R>(&self, request: &mut R) -> Result<Option<GatewayOutcome>>
    where
        R: RequestContext + ?Sized,
    {
        let Some(incoming) = request.current_request_session_id().map(str::to_string) else {
            return Ok(None);
        };

        let resolved = self.participant.find(&incoming)?;
        let resolved_id = resolved.id();

        let rewritten = resolved_id != incoming;
        if rewritten {
            debug!(from = %incoming, to = %resolved_id, "Rewriting session id");
            let session = resolved.session.lock();
            request.rewrite_outgoing_id(&session, &resolved_id);
        }

        Ok(Some(GatewayOutcome {
            resolved,
            rewritten,
        }))
    }
}
