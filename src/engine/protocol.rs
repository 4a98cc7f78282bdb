//! Message types exchanged between the transport and the match actor.
//!
//! Inbound requests are [`Command`]s sent over an mpsc channel; commands that
//! expect an acknowledgement carry a oneshot reply. Outbound traffic is
//! [`Outbound`], addressed by transport session and fanned out over a
//! broadcast channel (one room per process).

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::engine::error::MatchError;
use crate::engine::models::*;

pub type Ack<T> = oneshot::Sender<Result<T, MatchError>>;

#[derive(Debug)]
pub enum Command {
    Join {
        session: SessionId,
        name: String,
        avatar: String,
        reply: Ack<PlayerId>,
    },
    AdminLogin {
        session: SessionId,
    },
    CreateMatch {
        session: SessionId,
        board_size: usize,
        tiles: Vec<u8>,
        reply: Ack<()>,
    },
    StartMatch {
        session: SessionId,
        reply: Ack<()>,
    },
    EndMatch {
        session: SessionId,
        reply: Ack<()>,
    },
    IsMatchOpen {
        reply: oneshot::Sender<bool>,
    },
    IsNameAvailable {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    Reconnect {
        session: SessionId,
        player_id: PlayerId,
        reply: Ack<()>,
    },
    SubmitAnswer {
        session: SessionId,
        text: String,
    },
    ChooseEnemy {
        session: SessionId,
        player_id: PlayerId,
    },
    /// The transport lost this session.
    Disconnect {
        session: SessionId,
    },
    /// Posted by the grace timer spawned on disconnect.
    GraceExpired {
        player_id: PlayerId,
        session: SessionId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Broadcast(ServerEvent),
    SendTo {
        session: SessionId,
        event: ServerEvent,
    },
    BroadcastExcept {
        exclude: SessionId,
        event: ServerEvent,
    },
    /// Ask the transport to close this session.
    Disconnect {
        session: SessionId,
    },
}

impl Outbound {
    /// The event this message carries for `session`, if it is addressed to it.
    pub fn for_session(&self, session: &str) -> Option<&ServerEvent> {
        match self {
            Outbound::Broadcast(event) => Some(event),
            Outbound::SendTo { session: s, event } if s == session => Some(event),
            Outbound::BroadcastExcept { exclude, event } if exclude != session => Some(event),
            _ => None,
        }
    }
}

/// Cloneable handle the transport uses to talk to the match actor.
#[derive(Clone)]
pub struct MatchHandle {
    pub cmd_tx: mpsc::Sender<Command>,
    pub event_tx: broadcast::Sender<Outbound>,
}

impl MatchHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.event_tx.subscribe()
    }

    /// Send a command and wait for its acknowledgement.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(Ack<T>) -> Command,
    ) -> Result<T, MatchError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| MatchError::InvalidState {
                expected: MatchPhase::Open,
                actual: MatchPhase::Closed,
            })?;
        rx.await.unwrap_or(Err(MatchError::InvalidState {
            expected: MatchPhase::Open,
            actual: MatchPhase::Closed,
        }))
    }

    /// Fire-and-forget command (answers, choices, disconnects).
    pub async fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            tracing::warn!("match actor is gone, dropping command");
        }
    }

    pub async fn is_match_open(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::IsMatchOpen { reply: tx }).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn is_name_available(&self, name: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        let cmd = Command::IsNameAvailable {
            name: name.to_string(),
            reply: tx,
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_session_addressing() {
        let direct = Outbound::SendTo {
            session: "s1".into(),
            event: ServerEvent::TenSecondsLeft,
        };
        assert!(direct.for_session("s1").is_some());
        assert!(direct.for_session("s2").is_none());

        let except = Outbound::BroadcastExcept {
            exclude: "s1".into(),
            event: ServerEvent::MatchOpen,
        };
        assert!(except.for_session("s1").is_none());
        assert!(except.for_session("s2").is_some());

        let close = Outbound::Disconnect { session: "s1".into() };
        assert!(close.for_session("s1").is_none());
    }
}
