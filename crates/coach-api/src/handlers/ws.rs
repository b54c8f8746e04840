//! WebSocket handler for realtime seat maps
//!
//! A connection joins the room of one vehicle instance and receives every seat
//! transition on it. It may also lock and unlock single seats without going
//! through the HTTP reservation endpoint.
//!
//! Inbound:
//!
//! ```text
//! {"type":"join_room","vehicle_id":"…"}
//! {"type":"lock_seat","seat_number":"1A"}
//! {"type":"unlock_seat","seat_number":"1A"}
//! {"type":"ping"}
//! ```
//!
//! Outbound: `seat_locked` / `seat_unlocked` / `seat_booked` events, `joined`
//! with a seat map snapshot, `lock_denied`, `error` and `pong`.

use crate::dto::SeatView;
use crate::security::{Throttle, Throttles};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use coach_auth::AuthenticatedUser;
use coach_core::models::SeatEvent;
use coach_services::broadcaster::ConnectionId;
use coach_services::{BookingEngine, ReservationOutcome, Subscription};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Client to server messages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { vehicle_id: Uuid },
    LockSeat { seat_number: String },
    UnlockSeat { seat_number: String },
    Ping,
}

/// Server to client messages other than seat events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room joined; the snapshot reconciles anything missed before joining
    Joined {
        vehicle_id: Uuid,
        seats: Vec<SeatView>,
    },
    LockDenied {
        seat_number: String,
    },
    Error {
        message: String,
    },
    Pong,
}

/// Per-connection state: who is asking and which room they are in
pub struct RoomSession {
    engine: Arc<BookingEngine>,
    connection: ConnectionId,
    caller: String,
    room: Option<Uuid>,
    lock_throttle: Throttle,
}

impl RoomSession {
    pub fn new(engine: Arc<BookingEngine>, connection: ConnectionId, caller: String) -> Self {
        Self {
            engine,
            connection,
            caller,
            room: None,
            lock_throttle: Throttle::unlimited("reservations"),
        }
    }

    /// Seat locks share the caller's HTTP reservation budget
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.lock_throttle = throttle;
        self
    }

    pub fn room(&self) -> Option<Uuid> {
        self.room
    }

    /// Apply one client message; returns the direct reply, if any.
    ///
    /// Granted locks and unlocks are not answered directly, the room event
    /// reaches this connection like every other viewer.
    pub async fn handle(&mut self, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::JoinRoom { vehicle_id } => Some(self.join(vehicle_id).await),
            ClientMessage::LockSeat { seat_number } => {
                let Some(vehicle_id) = self.room else {
                    return Some(not_in_room());
                };
                if let Err(e) = self.lock_throttle.check(&self.caller) {
                    return Some(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
                match self
                    .engine
                    .reserve_seats(vehicle_id, &[seat_number.clone()], &self.caller)
                    .await
                {
                    Ok(ReservationOutcome::Reserved(_)) => None,
                    Ok(ReservationOutcome::PartiallyUnavailable(_)) => {
                        Some(ServerMessage::LockDenied { seat_number })
                    }
                    Err(e) => Some(ServerMessage::Error {
                        message: e.to_string(),
                    }),
                }
            }
            ClientMessage::UnlockSeat { seat_number } => {
                let Some(vehicle_id) = self.room else {
                    return Some(not_in_room());
                };
                match self
                    .engine
                    .unlock_seats(vehicle_id, &[seat_number], &self.caller)
                    .await
                {
                    Ok(_) => None,
                    Err(e) => Some(ServerMessage::Error {
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    async fn join(&mut self, vehicle_id: Uuid) -> ServerMessage {
        // Subscribe before taking the snapshot so no transition falls in between
        self.engine.broadcaster.join(self.connection, vehicle_id);

        let map = match self.engine.scheduler.seat_map(vehicle_id).await {
            Ok(map) => map,
            Err(e) => {
                self.engine.broadcaster.leave(self.connection);
                self.room = None;
                return ServerMessage::Error {
                    message: e.to_string(),
                };
            }
        };
        self.room = Some(vehicle_id);

        let seats = map
            .seats
            .iter()
            .map(|s| SeatView::new(s, map.vehicle.base_price, &self.caller))
            .collect();

        ServerMessage::Joined { vehicle_id, seats }
    }
}

fn not_in_room() -> ServerMessage {
    ServerMessage::Error {
        message: "join a vehicle room first".to_string(),
    }
}

async fn send_json<T: Serialize>(session: &mut Session, msg: &T) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await.is_ok(),
        Err(e) => {
            error!("Could not encode websocket message: {}", e);
            true
        }
    }
}

/// WebSocket connection handler
///
/// GET /ws
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    engine: web::Data<Arc<BookingEngine>>,
    throttles: web::Data<Throttles>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let subscription = engine.broadcaster.connect();
    info!(
        caller = %user.user_id,
        connection = subscription.id,
        "WebSocket connection established"
    );

    let room = RoomSession::new(engine.get_ref().clone(), subscription.id, user.user_id)
        .with_throttle(throttles.reservations.clone());
    actix_web::rt::spawn(ws_session(session, msg_stream, subscription, room));

    Ok(response)
}

async fn ws_session(
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    mut subscription: Subscription,
    mut room: RoomSession,
) {
    let connection = subscription.id;
    let mut ping_interval = interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(connection, "Received text: {}", text);
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => room.handle(msg).await,
                            Err(e) => Some(ServerMessage::Error {
                                message: format!("unrecognised message: {}", e),
                            }),
                        };
                        if let Some(reply) = reply {
                            if !send_json(&mut session, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        info!(connection, "Client closed connection: {:?}", reason);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(connection, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            event = subscription.receiver.recv() => {
                match event {
                    Some(event) => {
                        if !send_json::<SeatEvent>(&mut session, &event).await {
                            warn!(connection, "Failed to send seat event, closing connection");
                            break;
                        }
                    }
                    // Pruned by the broadcaster
                    None => break,
                }
            }

            _ = ping_interval.tick() => {
                if session.ping(b"").await.is_err() {
                    warn!(connection, "Failed to send ping, closing connection");
                    break;
                }
            }
        }
    }

    room.engine.broadcaster.disconnect(connection);
    info!(connection, room = ?room.room(), "WebSocket connection closed");
    let _ = session.close(None).await;
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_handler));
}
