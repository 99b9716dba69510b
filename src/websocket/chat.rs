use crate::error::AppError;
use crate::services::conversation::ConversationService;
use crate::utils::jwt::decode_jwt;
use crate::websocket::hub::ChatHub;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Events a client may publish. Message payloads are opaque to the relay:
/// the client persists through the REST path first and fans the stored
/// message out here as a delivery hint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientEvent {
    JoinConversation {
        conversation_id: i32,
    },
    SendMessage {
        conversation_id: i32,
        message: serde_json::Value,
    },
    Typing {
        conversation_id: i32,
        username: String,
    },
    StopTyping {
        conversation_id: i32,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ServerEvent {
    NewMessage {
        conversation_id: i32,
        message: serde_json::Value,
    },
    UserTyping {
        conversation_id: i32,
        username: String,
    },
    UserStoppedTyping {
        conversation_id: i32,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(hub): Extension<ChatHub>,
    Extension(db): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_jwt(&query.token).map_err(|_| AppError::Unauthorized)?;
    if !crate::utils::jwt::is_access_token(&claims) {
        return Err(AppError::Unauthorized);
    }
    let user_id: i32 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, hub, db)))
}

async fn handle_socket(socket: WebSocket, user_id: i32, hub: ChatHub, db: DatabaseConnection) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn_id, mut rx) = hub.register(user_id);

    tracing::info!("WebSocket connected for user {}", user_id);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_event(&recv_hub, &db, user_id, conn_id, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(user_id, conn_id);
    tracing::info!("WebSocket disconnected for user {}", user_id);
}

async fn handle_client_event(
    hub: &ChatHub,
    db: &DatabaseConnection,
    user_id: i32,
    conn_id: u64,
    raw: &str,
) {
    let event: ClientEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Ignoring malformed ws event from user {}: {}", user_id, e);
            return;
        }
    };

    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            // Membership is checked once here; publishing requires a prior join.
            let service = ConversationService::new(db.clone());
            match service.is_participant(conversation_id, user_id).await {
                Ok(true) => hub.join_room(conversation_id, user_id),
                Ok(false) => {
                    tracing::debug!(
                        "User {} denied joining conversation {}",
                        user_id,
                        conversation_id
                    );
                }
                Err(e) => tracing::warn!("Join membership check failed: {}", e),
            }
        }
        ClientEvent::SendMessage {
            conversation_id,
            message,
        } => {
            if !hub.is_room_member(conversation_id, conn_id) {
                return;
            }
            publish(
                hub,
                conversation_id,
                conn_id,
                &ServerEvent::NewMessage {
                    conversation_id,
                    message,
                },
            );
        }
        ClientEvent::Typing {
            conversation_id,
            username,
        } => {
            if !hub.is_room_member(conversation_id, conn_id) {
                return;
            }
            publish(
                hub,
                conversation_id,
                conn_id,
                &ServerEvent::UserTyping {
                    conversation_id,
                    username,
                },
            );
        }
        ClientEvent::StopTyping { conversation_id } => {
            if !hub.is_room_member(conversation_id, conn_id) {
                return;
            }
            publish(
                hub,
                conversation_id,
                conn_id,
                &ServerEvent::UserStoppedTyping { conversation_id },
            );
        }
    }
}

fn publish(hub: &ChatHub, conversation_id: i32, origin_conn_id: u64, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => hub.broadcast_to_room(conversation_id, origin_conn_id, &payload),
        Err(e) => tracing::error!("Failed to serialize ws event: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_from_wire_names() {
        let joined: ClientEvent =
            serde_json::from_str(r#"{"type":"join-conversation","conversation_id":5}"#).unwrap();
        assert!(matches!(
            joined,
            ClientEvent::JoinConversation { conversation_id: 5 }
        ));

        let typing: ClientEvent = serde_json::from_str(
            r#"{"type":"typing","conversation_id":5,"username":"hero1"}"#,
        )
        .unwrap();
        assert!(matches!(typing, ClientEvent::Typing { ref username, .. } if username == "hero1"));
    }

    #[test]
    fn malformed_event_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"unknown"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn server_events_serialize_with_wire_names() {
        let event = ServerEvent::NewMessage {
            conversation_id: 9,
            message: serde_json::json!({"id": 1, "content": "hi"}),
        };
        let wire = serde_json::to_string(&event).unwrap();
        assert!(wire.contains(r#""type":"new-message""#));
        assert!(wire.contains(r#""conversation_id":9"#));

        let stopped = ServerEvent::UserStoppedTyping { conversation_id: 9 };
        let wire = serde_json::to_string(&stopped).unwrap();
        assert!(wire.contains(r#""type":"user-stopped-typing""#));
    }
}
