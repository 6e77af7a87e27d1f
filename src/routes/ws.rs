// WebSocket live-rate stream: one send pump per connected viewer

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::hub::Subscription;
use crate::models::RateSample;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_realtime(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let monitor = state.monitor.clone();
    ws.on_upgrade(move |socket| async move {
        let subscription = match monitor.subscribe().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "realtime stream rejected");
                return;
            }
        };
        let current = monitor.realtime_rate().await;
        if let Err(e) = stream_realtime(socket, subscription, current).await {
            tracing::info!("Realtime stream error: {}", e);
        }
    })
}

/// Pumps hub samples to the socket until the client goes away, a send fails
/// or times out, or the hub drops this subscriber. Dropping `subscription`
/// on return unregisters it.
async fn stream_realtime(
    socket: WebSocket,
    mut subscription: Subscription,
    current: RateSample,
) -> anyhow::Result<()> {
    tracing::info!(subscriber = subscription.id(), "Client connected to realtime stream");
    let (mut sink, mut incoming) = socket.split();

    let json = serde_json::to_string(&current)?;
    let r = timeout(WS_SEND_TIMEOUT, sink.send(Message::Text(json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + WS_PING_INTERVAL,
        WS_PING_INTERVAL,
    );
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            sample = subscription.recv() => {
                let Some(sample) = sample else {
                    tracing::info!(subscriber = subscription.id(), "Dropped by hub; closing realtime stream");
                    break;
                };
                let json = serde_json::to_string(&sample)?;
                let r = timeout(WS_SEND_TIMEOUT, sink.send(Message::Text(json.into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sink.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::info!(subscriber = subscription.id(), "Client disconnected from realtime stream");
    Ok(())
}
