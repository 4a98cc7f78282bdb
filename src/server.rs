//! gRPC transport for the match actor.
//!
//! Every `Connect` stream is one client session. Inbound messages become
//! [`Command`]s; outbound [`Outbound`] traffic is filtered down to what the
//! session should see and written back on the same stream.

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use crate::engine::error::MatchError;
use crate::engine::models::{ServerEvent, SessionId};
use crate::engine::protocol::{Command, MatchHandle, Outbound};

pub mod proto {
    tonic::include_proto!("trivia.v1");
}

use proto::client_message::Request as ClientRequest;
use proto::match_service_server::MatchService;
use proto::server_message::Message;
use proto::*;

type Outgoing = mpsc::Sender<Result<ServerMessage, Status>>;

/// The gRPC service implementation.
pub struct MatchGateway {
    handle: MatchHandle,
}

impl MatchGateway {
    pub fn new(handle: MatchHandle) -> Self {
        Self { handle }
    }
}

// --- Conversion helpers: engine -> proto ---

fn event_to_proto(event: &ServerEvent) -> ServerMessage {
    ServerMessage {
        message: Some(Message::Event(Event {
            event_type: event.event_type().to_string(),
            payload_json: serde_json::to_vec(event).unwrap_or_default(),
        })),
    }
}

fn ack_to_proto<T: Serialize>(request_id: String, result: Result<T, MatchError>) -> ServerMessage {
    let ack = match result {
        Ok(value) => Ack {
            request_id,
            ok: true,
            error: String::new(),
            payload_json: serde_json::to_vec(&value).unwrap_or_default(),
        },
        Err(e) => Ack {
            request_id,
            ok: false,
            error: e.to_string(),
            payload_json: Vec::new(),
        },
    };
    ServerMessage {
        message: Some(Message::Ack(ack)),
    }
}

/// Tile codes arrive as u32; anything above u8 is left for board
/// validation to reject.
fn tiles_from_proto(tiles: &[u32]) -> Vec<u8> {
    tiles
        .iter()
        .map(|&t| u8::try_from(t).unwrap_or(u8::MAX))
        .collect()
}

/// Route one client message to the actor. Returns the acknowledgement for
/// request-style messages.
async fn dispatch(
    handle: &MatchHandle,
    session: &SessionId,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    let request_id = msg.request_id;
    let session = session.clone();

    let Some(request) = msg.request else {
        return Some(ServerMessage {
            message: Some(Message::Ack(Ack {
                request_id,
                ok: false,
                error: "empty request".into(),
                payload_json: Vec::new(),
            })),
        });
    };

    let ack = match request {
        ClientRequest::Join(join) => {
            let result = handle
                .request(|reply| Command::Join {
                    session,
                    name: join.name,
                    avatar: join.avatar,
                    reply,
                })
                .await;
            ack_to_proto(request_id, result)
        }
        ClientRequest::AdminLogin(_) => {
            handle.send(Command::AdminLogin { session }).await;
            ack_to_proto(request_id, Ok::<(), MatchError>(()))
        }
        ClientRequest::CreateMatch(create) => {
            let result = handle
                .request(|reply| Command::CreateMatch {
                    session,
                    board_size: create.board_size as usize,
                    tiles: tiles_from_proto(&create.tiles),
                    reply,
                })
                .await;
            ack_to_proto(request_id, result)
        }
        ClientRequest::StartMatch(_) => {
            let result = handle
                .request(|reply| Command::StartMatch { session, reply })
                .await;
            ack_to_proto(request_id, result)
        }
        ClientRequest::EndMatch(_) => {
            let result = handle
                .request(|reply| Command::EndMatch { session, reply })
                .await;
            ack_to_proto(request_id, result)
        }
        ClientRequest::IsMatchOpen(_) => {
            let open = handle.is_match_open().await;
            ack_to_proto(request_id, Ok::<bool, MatchError>(open))
        }
        ClientRequest::IsNameAvailable(req) => {
            let available = handle.is_name_available(&req.name).await;
            ack_to_proto(request_id, Ok::<bool, MatchError>(available))
        }
        ClientRequest::Reconnect(req) => {
            let result = handle
                .request(|reply| Command::Reconnect {
                    session,
                    player_id: req.player_id,
                    reply,
                })
                .await;
            ack_to_proto(request_id, result)
        }
        ClientRequest::SubmitAnswer(req) => {
            handle
                .send(Command::SubmitAnswer {
                    session,
                    text: req.answer,
                })
                .await;
            return None;
        }
        ClientRequest::ChooseEnemy(req) => {
            handle
                .send(Command::ChooseEnemy {
                    session,
                    player_id: req.player_id,
                })
                .await;
            return None;
        }
    };
    Some(ack)
}

/// Forward the actor's traffic for `session` until the actor asks to close
/// it or the client goes away.
async fn forward_events(
    session: SessionId,
    mut events: broadcast::Receiver<Outbound>,
    tx: Outgoing,
    closed: oneshot::Sender<()>,
) {
    loop {
        match events.recv().await {
            Ok(Outbound::Disconnect { session: s }) if s == session => {
                tracing::debug!(%session, "closing session on request");
                let _ = closed.send(());
                return;
            }
            Ok(out) => {
                let Some(event) = out.for_session(&session) else {
                    continue;
                };
                if tx.send(Ok(event_to_proto(event))).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Dropped events may include a prompt; the client has to
                // reconnect to get it re-sent.
                tracing::warn!(%session, skipped, "session lagged, closing");
                let _ = closed.send(());
                return;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[tonic::async_trait]
impl MatchService for MatchGateway {
    type ConnectStream = ReceiverStream<Result<ServerMessage, Status>>;

    async fn connect(
        &self,
        request: Request<Streaming<ClientMessage>>,
    ) -> Result<Response<Self::ConnectStream>, Status> {
        let mut inbound = request.into_inner();
        let session: SessionId = uuid::Uuid::new_v4().to_string();
        tracing::info!(%session, "client connected");

        let (tx, rx) = mpsc::channel(64);
        let (closed_tx, mut closed_rx) = oneshot::channel();
        let pump = tokio::spawn(forward_events(
            session.clone(),
            self.handle.subscribe(),
            tx.clone(),
            closed_tx,
        ));

        let handle = self.handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = inbound.message() => match msg {
                        Ok(Some(msg)) => {
                            if let Some(ack) = dispatch(&handle, &session, msg).await {
                                if tx.send(Ok(ack)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(status) => {
                            tracing::debug!(%session, %status, "inbound stream error");
                            break;
                        }
                    },
                    _ = &mut closed_rx => break,
                }
            }
            pump.abort();
            tracing::info!(%session, "client disconnected");
            handle.send(Command::Disconnect { session }).await;
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
