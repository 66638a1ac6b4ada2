//! Generation chain trigger over HTTP.
//!
//! Each link posts to the internal generate endpoint and returns before the
//! request completes, so the caller's own response is never held up by the
//! next generation step. Delivery failures are logged; the order then waits
//! for a manual reset.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::http_support::{client_with_timeout, status_message};
use crate::domain::ports::{GenerationTrigger, INTERNAL_SECRET_HEADER, JobDispatchError};
use crate::domain::{OrderId, TRACE_ID_HEADER, TraceId};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerBody {
    order_id: OrderId,
}

/// [`GenerationTrigger`] firing detached HTTP requests at this service.
#[derive(Clone)]
pub struct HttpGenerationTrigger {
    client: Client,
    endpoint: Url,
    secret: Zeroizing<String>,
}

impl HttpGenerationTrigger {
    /// `endpoint` is the absolute URL of the internal generate route.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        secret: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, JobDispatchError> {
        let client = client_with_timeout(timeout)
            .map_err(|error| JobDispatchError::unavailable(error.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            secret,
        })
    }

    async fn deliver(self, order_id: OrderId) {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(INTERNAL_SECRET_HEADER, self.secret.as_str())
            .json(&TriggerBody { order_id });
        if let Some(trace_id) = TraceId::current() {
            request = request.header(TRACE_ID_HEADER, trace_id.to_string());
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%order_id, "generation step accepted");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.bytes().await.unwrap_or_default();
                warn!(
                    %order_id,
                    detail = %status_message(status, body.as_ref()),
                    "generation step was refused"
                );
            }
            Err(error) => warn!(%order_id, %error, "generation step could not be delivered"),
        }
    }
}

#[async_trait]
impl GenerationTrigger for HttpGenerationTrigger {
    async fn trigger(&self, order_id: OrderId) -> Result<(), JobDispatchError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| JobDispatchError::unavailable(error.to_string()))?;
        runtime.spawn(TraceId::propagate(self.clone().deliver(order_id)));
        Ok(())
    }
}
