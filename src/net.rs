use std::sync::Arc;
use futures::{StreamExt, SinkExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tungstenite::Message;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use kart_sim::kart_core::types::KartInput;

use crate::state::SharedGameState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Ping,
    Input(KartInput),
}

impl ClientMessage {
    fn from_json(txt: &str) -> Option<Self> {
        serde_json::from_str(txt).ok()
    }
}

pub async fn start_websocket_server(listener: TcpListener, state: Arc<Mutex<SharedGameState>>) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("🌐 WebSocket listening on ws://{addr}");
    }

    loop {
        let raw = match listener.accept().await {
            Ok((raw, _)) => raw,
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                continue;
            }
        };
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::warn!("websocket handshake failed: {e}");
                    return;
                }
            };
            let (mut write, mut read) = ws.split();

            // -------------------------------
            // 1) Create outgoing message channel
            // -------------------------------
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let player_id = Uuid::new_v4();

            // -------------------------------
            // 2) Spawn send-loop task
            // -------------------------------
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if write.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
            });

            // -------------------------------
            // 3) Register client + kart
            // -------------------------------
            let slot = {
                let mut game = state_clone.lock().await;
                game.register_client(player_id, tx.clone());
                game.join(player_id)
            };

            tracing::info!(slot, "🟢 Player connected: {player_id}");

            let welcome = serde_json::json!({
                "type": "welcome",
                "player_id": player_id.to_string(),
                "slot": slot,
            });
            let _ = tx.send(welcome.to_string());

            // -------------------------------
            // 4) Main receive loop
            // -------------------------------
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };

                if !msg.is_text() {
                    continue;
                }
                let text = match msg.to_text() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                match ClientMessage::from_json(text) {
                    Some(ClientMessage::Ping) => {
                        let _ = tx.send("{\"type\":\"pong\"}".into());
                    }
                    Some(ClientMessage::Input(input)) => {
                        let mut game = state_clone.lock().await;
                        game.update_input(&player_id, input);
                    }
                    None => continue,
                }
            }

            tracing::info!(slot, "🔴 Player disconnected: {player_id}");
            let mut game = state_clone.lock().await;
            game.disconnect(&player_id);
        });
    }
}
