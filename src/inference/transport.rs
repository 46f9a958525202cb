//! HTTP plumbing shared by the provider adapters: cancellable requests and
//! server-sent event framing.

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{LlmError, LlmResult};

/// Send a request, racing it against the cancellation token.
///
/// Non-success statuses are returned as errors built by `on_error` from the
/// status code and response body.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
    on_error: impl Fn(String) -> LlmError,
) -> LlmResult<reqwest::Response> {
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(LlmError::Cancelled),
        response = request.send() => response,
    }
    .map_err(|e| on_error(format!("request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(on_error(format!("API error {}: {}", status, body)));
    }
    Ok(response)
}

/// Read a JSON response body, racing it against the cancellation token.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    cancel: &CancellationToken,
    on_error: impl FnOnce(String) -> LlmError,
) -> LlmResult<T> {
    let bytes = tokio::select! {
        _ = cancel.cancelled() => return Err(LlmError::Cancelled),
        bytes = response.bytes() => bytes,
    };
    match bytes {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| on_error(format!("invalid response body: {}", e))),
        Err(e) => Err(on_error(format!("failed to read response: {}", e))),
    }
}

/// Read a streaming response, handing each event payload to `on_event`.
///
/// Stops early when the token is cancelled or the stream sends `[DONE]`.
pub(crate) async fn read_events<F>(
    provider: &str,
    response: reqwest::Response,
    cancel: &CancellationToken,
    on_event: F,
) -> LlmResult<()>
where
    F: FnMut(&str) -> LlmResult<()>,
{
    read_event_stream(provider, response.bytes_stream(), cancel, on_event).await
}

/// Frame a raw byte stream into server-sent events.
///
/// Bytes are decoded per complete event, so chunk boundaries may fall
/// anywhere, including inside a multi-byte character. Events without data
/// are skipped.
pub(crate) async fn read_event_stream<S, B, E, F>(
    provider: &str,
    stream: S,
    cancel: &CancellationToken,
    mut on_event: F,
) -> LlmResult<()>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(&str) -> LlmResult<()>,
{
    let mut events = std::pin::pin!(stream.eventsource());

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            event = events.next() => event,
        };

        let Some(event) = event else { break };
        let event =
            event.map_err(|e| LlmError::inference(provider, format!("stream error: {}", e)))?;
        trace!(provider, event = %event.event, "sse event");

        if event.data.is_empty() {
            continue;
        }
        if event.data == "[DONE]" {
            return Ok(());
        }
        on_event(&event.data)?;
    }
    Ok(())
}
