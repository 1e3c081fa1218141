//! Webhook handler for push deliveries

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Query,
    extract::State as AxumState,
    http::{HeaderMap, HeaderName},
};

use crate::dispatch::DownstreamClient;
use crate::matcher::RequestParams;
use crate::relay::{IncomingNotification, Outcome, Relay};

pub(super) const DELIVERY_HEADER: HeaderName = HeaderName::from_static("x-github-delivery");

pub(super) fn header(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Handles a delivery from the source-control host.
pub async fn handle_webhook<C: DownstreamClient + 'static>(
    AxumState(relay): AxumState<Arc<Relay<C>>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Outcome {
    let names = relay.header_names();
    let notification = IncomingNotification {
        event: header(&headers, &names.event),
        signature: header(&headers, &names.signature),
        delivery: header(&headers, &DELIVERY_HEADER),
        params: RequestParams {
            branch: params.get("branch").cloned(),
            uuid: params.get("uuid").cloned(),
        },
        body,
    };

    relay.handle(notification).await
}
