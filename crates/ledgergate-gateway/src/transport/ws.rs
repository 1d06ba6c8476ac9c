//! Realtime WebSocket endpoint.
//!
//! Connection lifecycle:
//! 1. The first text frame must be a `ConnectRequest`, within the handshake
//!    timeout.
//! 2. The request goes to the pump for admission; a rejection is answered
//!    with an error frame and the socket is closed.
//! 3. Once admitted, the peer's outbound queue is streamed to the socket
//!    until either side closes, after which the peer is unregistered.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_core::protocol::realtime::ConnectRequest;

use crate::app_state::AppState;
use crate::realtime::error_frame;

pub async fn realtime_upgrade(
    State(app): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_peer(app, addr, socket).await {
            tracing::debug!(peer = %addr, error = %e, "realtime connection ended");
        }
    })
}

fn accepted_json(resource: &str) -> String {
    json!({ "type": "accepted", "resource": resource }).to_string()
}

async fn run_peer(app: AppState, addr: SocketAddr, socket: WebSocket) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let request = match timeout(app.cfg().gateway.handshake_timeout(), read_connect(&mut ws_rx)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            let _ = ws_tx.send(error_frame(&e)).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return Err(e);
        }
        Err(_) => {
            let e = LedgerGateError::BadRequest("handshake timed out".into());
            let _ = ws_tx.send(error_frame(&e)).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return Err(e);
        }
    };

    let resource = request.resource.clone();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(app.cfg().realtime.outbound_queue);

    if let Err(e) = app.pump().connect(addr, request, out_tx).await {
        let _ = ws_tx.send(error_frame(&e)).await;
        let _ = ws_tx.send(Message::Close(None)).await;
        return Ok(());
    }

    if ws_tx.send(Message::Text(accepted_json(&resource))).await.is_ok() {
        loop {
            tokio::select! {
                out = out_rx.recv() => {
                    // None: the pump dropped us (shutdown).
                    let Some(msg) = out else { break; };
                    if ws_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                incoming = ws_rx.next() => {
                    match incoming {
                        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                        // Peers only listen; anything else they send is ignored.
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    app.pump().disconnect(addr).await;
    let _ = ws_tx.send(Message::Close(None)).await;
    Ok(())
}

async fn read_connect(ws_rx: &mut SplitStream<WebSocket>) -> Result<ConnectRequest> {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(s)) => return ConnectRequest::decode(&s),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Binary(_)) => {
                return Err(LedgerGateError::BadRequest(
                    "connect request must be a text frame".into(),
                ))
            }
            Ok(Message::Close(_)) | Err(_) => break,
        }
    }
    Err(LedgerGateError::BadRequest("closed before connect request".into()))
}
