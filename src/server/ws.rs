//! WebSocket transport adapter.
//!
//! One connection per session. Each inbound binary message is one
//! utterance of 16-bit little-endian mono PCM. Synthesized frames go back
//! as binary messages (4-byte LE sample rate, then LE PCM); side-channel
//! events go back as text messages on the same socket.

use crate::notify::{Outbound, SessionChannel, SideChannel};
use crate::pipeline::{AudioBuffer, SynthesizedFrame, TranslationPipeline};
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Sample rate of inbound audio; the configured default when absent.
    pub sample_rate: Option<u32>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<WsParams>,
) -> Response {
    let sample_rate = params
        .sample_rate
        .filter(|rate| *rate > 0)
        .unwrap_or(state.default_sample_rate);
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, sample_rate))
}

/// Encodes a frame as its binary wire message.
pub fn encode_frame(frame: &SynthesizedFrame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + frame.samples.len() * 2);
    bytes.extend_from_slice(&frame.sample_rate.to_le_bytes());
    for sample in &frame.samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Run one utterance through the pipeline and queue its frames on `channel`.
///
/// Returns the number of frames queued. Failures end the utterance only;
/// the session stays usable.
pub async fn relay_utterance(
    pipeline: &TranslationPipeline,
    session_id: &str,
    audio: AudioBuffer,
    channel: &SessionChannel,
) -> usize {
    if audio.samples.is_empty() {
        tracing::debug!(session = session_id, "empty utterance ignored");
        return 0;
    }

    let mut frames = match pipeline.run(session_id, audio).await {
        Ok(frames) => frames,
        Err(e) if e.is_fatal() => {
            tracing::error!(session = session_id, error = %e, "utterance dropped; provider not usable");
            return 0;
        }
        Err(e) => {
            tracing::warn!(session = session_id, error = %e, "utterance dropped");
            return 0;
        }
    };

    let mut sent = 0;
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(frame) => {
                if let Err(e) = channel.send_binary(encode_frame(&frame)) {
                    tracing::debug!(session = session_id, error = %e, "connection gone; synthesis abandoned");
                    break;
                }
                sent += 1;
            }
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "synthesis stopped");
                break;
            }
        }
    }
    sent
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(message) = outbound.recv().await {
        let message = match message {
            Outbound::Text(text) => Message::Text(text.into()),
            Outbound::Binary(bytes) => Message::Binary(bytes.into()),
            Outbound::Close => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                break;
            }
        };
        if sink.send(message).await.is_err() {
            break;
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String, sample_rate: u32) {
    let (sink, mut incoming) = socket.split();
    let (channel, outbound) = SessionChannel::new();
    let channel = Arc::new(channel);
    let registered: Arc<dyn SideChannel> = channel.clone();
    state.channels.register(&session_id, registered.clone());
    tracing::info!(session = %session_id, sample_rate, "session connected");

    let writer = tokio::spawn(write_outbound(sink, outbound));
    let mut closed = channel.closed_signal();

    loop {
        let message = tokio::select! {
            message = incoming.next() => message,
            _ = closed.changed() => break,
        };
        match message {
            Some(Ok(Message::Binary(bytes))) => {
                let audio = AudioBuffer::from_le_bytes(sample_rate, &bytes);
                // A reset while the utterance is in flight drops the pipeline run.
                tokio::select! {
                    _ = relay_utterance(&state.pipeline, &session_id, audio, &channel) => {}
                    _ = closed.changed() => break,
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(session = %session_id, error = %e, "websocket receive failed");
                break;
            }
        }
    }

    state.channels.unregister(&session_id, &registered);
    if let Err(e) = channel.close() {
        tracing::debug!(session = %session_id, error = %e, "side-channel close failed");
    }
    if let Err(e) = writer.await {
        tracing::debug!(session = %session_id, error = %e, "writer task ended abnormally");
    }
    tracing::info!(session = %session_id, "session disconnected");
}
