//! WebSocket server for live ledger notifications

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::ledger::Notification;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Ledger notification channel
    pub tx: broadcast::Sender<Notification>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    /// Empty means every loan
    pub subscribed_loans: Vec<u64>,
}

impl ClientInfo {
    fn wants(&self, notification: &Notification) -> bool {
        if self.subscribed_loans.is_empty() {
            return true;
        }
        notification
            .loan_id()
            .map(|id| self.subscribed_loans.contains(&id))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { loan_ids: Vec<u64> },
    Unsubscribe { loan_ids: Vec<u64> },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Notification { notification: Notification },
    Subscribed { loan_ids: Vec<u64> },
    Unsubscribed { loan_ids: Vec<u64> },
    Pong,
    Lagged { skipped: u64 },
}

impl WsState {
    pub fn new(tx: broadcast::Sender<Notification>) -> Self {
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, client_id: String) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientInfo {
                client_id,
                subscribed_loans: vec![],
            },
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }

    async fn subscribe(&self, client_id: &str, loan_ids: &[u64]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            for id in loan_ids {
                if !client.subscribed_loans.contains(id) {
                    client.subscribed_loans.push(*id);
                }
            }
        }
    }

    async fn unsubscribe(&self, client_id: &str, loan_ids: &[u64]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.subscribed_loans.retain(|id| !loan_ids.contains(id));
        }
    }
}

/// Upgrades the HTTP connection to a WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone()).await;
    tracing::info!("Client {} connected", client_id);

    let (mut sender, mut receiver) = socket.split();
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let send_state = state.clone();
    let send_client = client_id.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = rx.recv() => match received {
                    Ok(notification) => {
                        let clients = send_state.clients.read().await;
                        match clients.get(&send_client) {
                            Some(client) if client.wants(&notification) => {
                                ServerMessage::Notification { notification }
                            }
                            _ => continue,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client = %send_client, skipped, "Client lagged behind notifications");
                        ServerMessage::Lagged { skipped }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(msg) = internal_rx.recv() => msg,
                else => break,
            };

            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_client = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) else {
                        tracing::debug!(client = %recv_client, "Ignoring malformed client message");
                        continue;
                    };
                    let response = match client_msg {
                        ClientMessage::Subscribe { loan_ids } => {
                            recv_state.subscribe(&recv_client, &loan_ids).await;
                            tracing::info!("Client {} subscribed to {:?}", recv_client, loan_ids);
                            ServerMessage::Subscribed { loan_ids }
                        }
                        ClientMessage::Unsubscribe { loan_ids } => {
                            recv_state.unsubscribe(&recv_client, &loan_ids).await;
                            tracing::info!("Client {} unsubscribed from {:?}", recv_client, loan_ids);
                            ServerMessage::Unsubscribed { loan_ids }
                        }
                        ClientMessage::Ping => ServerMessage::Pong,
                    };
                    let _ = internal_tx.send(response).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerEvent, LedgerEventKind};
    use crate::models::AccountId;

    fn overdue(loan_id: u64) -> Notification {
        Notification::LoanOverdue {
            loan_id,
            borrower: None,
            lender: None,
            repay_by_timestamp: 0,
            detected_at: 1,
        }
    }

    #[test]
    fn test_subscription_filter() {
        let mut client = ClientInfo {
            client_id: "c".to_string(),
            subscribed_loans: vec![],
        };
        assert!(client.wants(&overdue(3)));

        client.subscribed_loans = vec![3];
        assert!(client.wants(&overdue(3)));
        assert!(!client.wants(&overdue(4)));

        let pool_event = Notification::Ledger(LedgerEvent {
            seq: 1,
            version: 1,
            timestamp: 0,
            kind: LedgerEventKind::LiquidityAdded {
                provider: AccountId::from("lp"),
                amount: 5,
                total_liquidity: 5,
            },
        });
        assert!(!client.wants(&pool_event));
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let (tx, _) = broadcast::channel(4);
        let state = WsState::new(tx);
        state.register_client("c".to_string()).await;
        state.subscribe("c", &[1, 2, 2]).await;
        state.unsubscribe("c", &[1]).await;
        let clients = state.clients.read().await;
        assert_eq!(clients["c"].subscribed_loans, vec![2]);
    }
}
