//! Match orchestrator: lifecycle, player registry and the turn state machine.
//!
//! A single [`MatchServer`] actor owns every piece of match state. The
//! transport talks to it through a [`MatchHandle`]; the actor processes one
//! [`Command`] at a time and is the only place game state is mutated.
//!
//! While a turn is in flight the actor keeps draining commands at every
//! suspension point (waiting for an answer, a choice, or a pacing delay), so
//! joins are rejected, reconnects are honored and grace timers fire without
//! a second thread of control.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::engine::config::ServerConfig;
use crate::engine::error::{Halt, MatchError};
use crate::engine::models::*;
use crate::engine::protocol::{Command, MatchHandle, Outbound};
use crate::engine::random::RandomSource;
use crate::game::board::Board;
use crate::game::cards::CardCatalog;
use crate::game::interpreter::{self, ActionHost};
use crate::game::player::Player;

pub const MIN_PLAYERS: usize = 2;

/// Input the current turn is blocked on.
#[derive(Debug, Clone)]
struct Awaiting {
    player_id: PlayerId,
    kind: ReplyKind,
    /// Re-sent to the player if they reconnect mid-wait.
    prompt: ServerEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Answer,
    Choice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Answer(String),
    Choice(PlayerId),
}

enum Wake {
    Command(Command),
    Timer,
    Closed,
}

pub struct MatchServer {
    config: ServerConfig,
    phase: MatchPhase,
    board: Option<Board>,
    catalog: Option<CardCatalog>,
    /// Registry in join order.
    players: Vec<Player>,
    /// Index of the player whose turn is current or next.
    turn: usize,
    /// The current turn's player was removed and `turn` already points at
    /// the next one.
    turn_player_removed: bool,
    admins: HashSet<SessionId>,
    rng: Box<dyn RandomSource>,
    cmd_rx: mpsc::Receiver<Command>,
    cmd_tx: mpsc::WeakSender<Command>,
    event_tx: broadcast::Sender<Outbound>,
    awaiting: Option<Awaiting>,
    reply: Option<Reply>,
    teardown_at: Option<Instant>,
    closed: bool,
}

impl MatchServer {
    pub fn new(config: ServerConfig, rng: Box<dyn RandomSource>) -> (Self, MatchHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(256);

        let server = Self {
            config,
            phase: MatchPhase::Closed,
            board: None,
            catalog: None,
            players: Vec::new(),
            turn: 0,
            turn_player_removed: false,
            admins: HashSet::new(),
            rng,
            cmd_rx,
            cmd_tx: cmd_tx.downgrade(),
            event_tx: event_tx.clone(),
            awaiting: None,
            reply: None,
            teardown_at: None,
            closed: false,
        };
        (server, MatchHandle { cmd_tx, event_tx })
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Drive the match until every handle is dropped.
    pub async fn run(mut self) {
        while !self.closed {
            match self.phase {
                MatchPhase::Running => {
                    if self.players.is_empty() {
                        tracing::info!("no players left, ending match");
                        self.end_match();
                        continue;
                    }
                    self.play_turn().await;
                    self.advance_turn();
                }
                MatchPhase::Ended => match self.next_event(self.teardown_at).await {
                    Wake::Command(cmd) => self.handle_command(cmd),
                    Wake::Timer => self.end_match(),
                    Wake::Closed => self.closed = true,
                },
                MatchPhase::Closed | MatchPhase::Open => match self.next_event(None).await {
                    Wake::Command(cmd) => self.handle_command(cmd),
                    Wake::Timer => {}
                    Wake::Closed => self.closed = true,
                },
            }
        }
        tracing::info!("match actor stopped");
    }

    // --- Outbound helpers ---

    fn emit(&self, msg: Outbound) {
        let _ = self.event_tx.send(msg);
    }

    fn broadcast(&self, event: ServerEvent) {
        self.emit(Outbound::Broadcast(event));
    }

    fn send_to(&self, session: &str, event: ServerEvent) {
        self.emit(Outbound::SendTo {
            session: session.to_string(),
            event,
        });
    }

    fn broadcast_positions(&self) {
        let positions: HashMap<PlayerId, usize> = self
            .players
            .iter()
            .map(|p| (p.id.clone(), p.position))
            .collect();
        self.broadcast(ServerEvent::PlayersUpdate { positions });
    }

    fn initial_game_info(&self) -> Option<ServerEvent> {
        let board = self.board.as_ref()?.serialize();
        Some(ServerEvent::InitialGameInfo {
            board_size: board.board_size,
            tiles: board.tiles,
            players: self.players.iter().map(Player::summary).collect(),
        })
    }

    // --- Registry helpers ---

    fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn find_player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn player_by_session(&self, session: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.session == session)
    }

    fn name_taken(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn require_admin(&self, session: &str) -> Result<(), MatchError> {
        if self.admins.contains(session) {
            Ok(())
        } else {
            Err(MatchError::NotAuthorized)
        }
    }

    fn require_phase(&self, expected: MatchPhase) -> Result<(), MatchError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(MatchError::InvalidState {
                expected,
                actual: self.phase,
            })
        }
    }

    // --- Command handling ---

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join {
                session,
                name,
                avatar,
                reply,
            } => {
                let result = self.join(&session, &name, &avatar);
                if let Err(e) = &result {
                    tracing::debug!(%session, error = %e, "join rejected");
                }
                let _ = reply.send(result);
            }
            Command::AdminLogin { session } => {
                tracing::info!(%session, "admin logged in");
                if let Some(info) = self.initial_game_info() {
                    self.send_to(&session, info);
                }
                self.admins.insert(session);
            }
            Command::CreateMatch {
                session,
                board_size,
                tiles,
                reply,
            } => {
                let result = self
                    .require_admin(&session)
                    .and_then(|_| self.create_match(board_size, &tiles));
                let _ = reply.send(result);
            }
            Command::StartMatch { session, reply } => {
                let result = self
                    .require_admin(&session)
                    .and_then(|_| self.start_match());
                let _ = reply.send(result);
            }
            Command::EndMatch { session, reply } => {
                let result = self.require_admin(&session).and_then(|_| {
                    if self.phase == MatchPhase::Closed {
                        return Err(MatchError::InvalidState {
                            expected: MatchPhase::Running,
                            actual: MatchPhase::Closed,
                        });
                    }
                    self.end_match();
                    Ok(())
                });
                let _ = reply.send(result);
            }
            Command::IsMatchOpen { reply } => {
                let _ = reply.send(self.phase == MatchPhase::Open);
            }
            Command::IsNameAvailable { name, reply } => {
                let name = name.trim();
                let available = self.phase == MatchPhase::Open
                    && Player::validate_name(name).is_ok()
                    && !self.name_taken(name);
                let _ = reply.send(available);
            }
            Command::Reconnect {
                session,
                player_id,
                reply,
            } => {
                let _ = reply.send(self.reconnect(&session, &player_id));
            }
            Command::SubmitAnswer { session, text } => {
                self.accept_reply(&session, ReplyKind::Answer, Reply::Answer(text));
            }
            Command::ChooseEnemy { session, player_id } => {
                self.accept_reply(&session, ReplyKind::Choice, Reply::Choice(player_id));
            }
            Command::Disconnect { session } => self.disconnect(&session),
            Command::GraceExpired { player_id, session } => {
                self.expire_grace(&player_id, &session)
            }
        }
    }

    fn join(&mut self, session: &str, name: &str, avatar: &str) -> Result<PlayerId, MatchError> {
        self.require_phase(MatchPhase::Open)?;
        let avatar: Avatar = avatar.parse().map_err(MatchError::InvalidJoin)?;
        let name = name.trim();
        Player::validate_name(name)?;
        if self.name_taken(name) {
            return Err(MatchError::InvalidJoin(format!("name {} already taken", name)));
        }
        if self.player_by_session(session).is_some() {
            return Err(MatchError::InvalidJoin("session already joined".into()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let player = Player::new(id.clone(), name.to_string(), avatar, session.to_string());
        let summary = player.summary();
        self.players.push(player);
        tracing::info!(player = %id, name = %summary.name, avatar = %avatar, "player joined");

        if let Some(info) = self.initial_game_info() {
            self.send_to(session, info);
        }
        self.broadcast(ServerEvent::PlayerJoined { player: summary });
        Ok(id)
    }

    fn create_match(&mut self, board_size: usize, tiles: &[u8]) -> Result<(), MatchError> {
        match self.phase {
            MatchPhase::Closed => {}
            MatchPhase::Ended => self.end_match(),
            actual => {
                return Err(MatchError::InvalidState {
                    expected: MatchPhase::Closed,
                    actual,
                })
            }
        }

        let board = Board::new(board_size, tiles)?;
        let catalog = CardCatalog::load(&self.config.cards_path)?;
        tracing::info!(
            board_size,
            tiles = board.tile_count(),
            questions = catalog.questions.len(),
            surprises = catalog.surprises.len(),
            timer = ?catalog.timer,
            "match opened"
        );

        self.board = Some(board);
        self.catalog = Some(catalog);
        self.players.clear();
        self.turn = 0;
        self.phase = MatchPhase::Open;
        self.broadcast(ServerEvent::MatchOpen);
        Ok(())
    }

    fn start_match(&mut self) -> Result<(), MatchError> {
        self.require_phase(MatchPhase::Open)?;
        if self.players.len() < MIN_PLAYERS {
            return Err(MatchError::NotEnoughPlayers(MIN_PLAYERS));
        }
        self.phase = MatchPhase::Running;
        self.turn = 0;
        tracing::info!(players = self.players.len(), "match started");
        if let Some(info) = self.initial_game_info() {
            self.broadcast(info);
        }
        Ok(())
    }

    /// Broadcast the end, close every player transport and reset to Closed.
    fn end_match(&mut self) {
        if self.phase == MatchPhase::Closed {
            return;
        }
        self.broadcast(ServerEvent::MatchEnded);
        self.phase = MatchPhase::Ended;
        for p in &self.players {
            self.emit(Outbound::Disconnect {
                session: p.session.clone(),
            });
        }
        self.players.clear();
        self.board = None;
        self.catalog = None;
        self.awaiting = None;
        self.reply = None;
        self.teardown_at = None;
        self.turn = 0;
        self.phase = MatchPhase::Closed;
        tracing::info!("match ended");
    }

    fn reconnect(&mut self, session: &str, player_id: &str) -> Result<(), MatchError> {
        let Some(player) = self.find_player_mut(player_id) else {
            return Err(MatchError::UnknownPlayer(player_id.to_string()));
        };
        if player.connected && player.session != session {
            return Err(MatchError::InvalidJoin("player is already connected".into()));
        }
        player.connected = true;
        player.session = session.to_string();
        let position = player.position;
        tracing::info!(player = %player_id, %session, "player reconnected");

        if let Some(info) = self.initial_game_info() {
            self.send_to(session, info);
        }
        self.broadcast(ServerEvent::PlayerInfo {
            player_id: player_id.to_string(),
            position,
        });
        if let Some(waiting) = self.awaiting.as_ref().filter(|a| a.player_id == player_id) {
            self.send_to(session, waiting.prompt.clone());
        }
        Ok(())
    }

    fn accept_reply(&mut self, session: &str, kind: ReplyKind, reply: Reply) {
        let expected = self
            .awaiting
            .as_ref()
            .filter(|a| a.kind == kind)
            .and_then(|a| self.player(&a.player_id))
            .is_some_and(|p| p.session == session);
        if !expected {
            tracing::debug!(%session, ?kind, "ignoring unsolicited reply");
            return;
        }
        self.awaiting = None;
        self.reply = Some(reply);
    }

    fn disconnect(&mut self, session: &str) {
        self.admins.remove(session);

        let grace = self.config.pacing.disconnect_grace();
        let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.session == session && p.connected)
        else {
            return;
        };
        player.connected = false;
        tracing::info!(player = %player.id, name = %player.name, "player disconnected, grace period started");

        let player_id = player.id.clone();
        let session = session.to_string();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::GraceExpired { player_id, session }).await;
            }
        });
    }

    fn expire_grace(&mut self, player_id: &str, session: &str) {
        let Some(idx) = self
            .players
            .iter()
            .position(|p| p.id == player_id && p.session == session && !p.connected)
        else {
            return;
        };
        let player = self.players.remove(idx);
        tracing::info!(player = %player.id, name = %player.name, "grace period expired, player removed");

        if idx < self.turn {
            self.turn -= 1;
        } else if idx == self.turn && self.phase == MatchPhase::Running {
            self.turn_player_removed = true;
        }

        self.broadcast(ServerEvent::PlayerDisconnected {
            player_id: player.id,
            name: player.name,
        });
    }

    // --- Suspension points ---

    async fn next_event(&mut self, wake: Option<Instant>) -> Wake {
        match wake {
            Some(at) => tokio::select! {
                cmd = self.cmd_rx.recv() => cmd.map_or(Wake::Closed, Wake::Command),
                _ = tokio::time::sleep_until(at) => Wake::Timer,
            },
            None => self.cmd_rx.recv().await.map_or(Wake::Closed, Wake::Command),
        }
    }

    fn ensure_running(&self) -> Result<(), Halt> {
        if self.phase == MatchPhase::Running && !self.closed {
            Ok(())
        } else {
            Err(Halt::MatchClosed)
        }
    }

    /// Pacing delay that keeps serving commands.
    async fn pause(&mut self, duration: Duration) -> Result<(), Halt> {
        if duration.is_zero() {
            return self.ensure_running();
        }
        let until = Instant::now() + duration;
        loop {
            match self.next_event(Some(until)).await {
                Wake::Command(cmd) => {
                    self.handle_command(cmd);
                    self.ensure_running()?;
                }
                Wake::Timer => return self.ensure_running(),
                Wake::Closed => {
                    self.closed = true;
                    return Err(Halt::MatchClosed);
                }
            }
        }
    }

    /// Block until the awaited player replies. `Ok(None)` means the
    /// deadline passed first.
    async fn await_reply(
        &mut self,
        awaiting: Awaiting,
        deadline: Option<Instant>,
        mut warn_at: Option<Instant>,
    ) -> Result<Option<Reply>, Halt> {
        let player_id = awaiting.player_id.clone();
        self.reply = None;
        self.awaiting = Some(awaiting);

        let result = loop {
            if let Some(reply) = self.reply.take() {
                break Ok(Some(reply));
            }
            if let Err(halt) = self.ensure_running() {
                break Err(halt);
            }
            if self.player(&player_id).is_none() {
                break Err(Halt::PlayerGone);
            }

            let wake = match (warn_at, deadline) {
                (Some(w), _) => Some(w),
                (None, d) => d,
            };
            match self.next_event(wake).await {
                Wake::Command(cmd) => self.handle_command(cmd),
                Wake::Timer if warn_at.is_some() => {
                    warn_at = None;
                    if let Some(p) = self.player(&player_id) {
                        self.send_to(&p.session, ServerEvent::TenSecondsLeft);
                    }
                }
                Wake::Timer => break Ok(None),
                Wake::Closed => {
                    self.closed = true;
                    break Err(Halt::MatchClosed);
                }
            }
        };

        self.awaiting = None;
        result
    }

    /// Wait forever on behalf of `player_id`; only a force-end or the
    /// player's removal gets the turn moving again.
    async fn stall(&mut self, player_id: &str) -> Halt {
        loop {
            if let Err(halt) = self.ensure_running() {
                return halt;
            }
            if self.player(player_id).is_none() {
                return Halt::PlayerGone;
            }
            match self.next_event(None).await {
                Wake::Command(cmd) => self.handle_command(cmd),
                Wake::Timer => {}
                Wake::Closed => {
                    self.closed = true;
                    return Halt::MatchClosed;
                }
            }
        }
    }

    // --- Turn pipeline ---

    async fn play_turn(&mut self) {
        let Some(player_id) = self.players.get(self.turn).map(|p| p.id.clone()) else {
            return;
        };
        self.turn_player_removed = false;
        tracing::debug!(player = %player_id, turn = self.turn, "turn started");

        match self.run_turn(&player_id).await {
            Ok(()) => {}
            Err(Halt::PlayerGone) => {
                tracing::info!(player = %player_id, "turn abandoned, player removed")
            }
            Err(Halt::MatchClosed) => return,
        }

        if self.phase == MatchPhase::Running {
            self.check_for_winner();
        }
    }

    async fn run_turn(&mut self, player_id: &str) -> Result<(), Halt> {
        interpreter::run_next_round(self, player_id).await?;

        let passes = self
            .find_player_mut(player_id)
            .ok_or(Halt::PlayerGone)?
            .take_pending_pass();
        if passes {
            tracing::info!(player = %player_id, "player passes this turn");
            self.broadcast(ServerEvent::PlayerPassedTurn {
                player_id: player_id.to_string(),
            });
            return self.pause(self.config.pacing.pass_cooldown()).await;
        }

        if self.question_pipeline(player_id).await? {
            let roll = self.roll_for(player_id);
            let tile_count = self.tile_count();
            let player = self.find_player_mut(player_id).ok_or(Halt::PlayerGone)?;
            player.move_by(i32::from(roll), tile_count);
            tracing::info!(player = %player_id, roll, position = player.position, "player moved");
        }
        self.broadcast_positions();

        self.resolve_surprises(player_id).await
    }

    /// Draw and run surprise cards while the player stands on a surprise
    /// tile they have not resolved yet during this visit.
    async fn resolve_surprises(&mut self, player_id: &str) -> Result<(), Halt> {
        loop {
            let (position, previous) = {
                let player = self.player(player_id).ok_or(Halt::PlayerGone)?;
                (player.position, player.previous_surprise_tile)
            };
            let on_surprise = self
                .board
                .as_ref()
                .is_some_and(|b| b.is_surprise_tile(position));
            if !on_surprise || previous == Some(position) {
                return Ok(());
            }
            if let Some(player) = self.find_player_mut(player_id) {
                player.previous_surprise_tile = Some(position);
            }

            let card = {
                let catalog = self.catalog.as_ref().ok_or(Halt::MatchClosed)?;
                let idx = self.rng.pick(catalog.surprises.len());
                catalog.surprises[idx].clone()
            };
            tracing::info!(player = %player_id, position, kind = ?card.kind, text = %card.text, "surprise card drawn");
            self.broadcast(ServerEvent::PlayerTookSurpriseCard {
                player_id: player_id.to_string(),
                kind: card.kind,
                text: card.text.clone(),
            });
            self.pause(self.config.pacing.surprise_reveal()).await?;

            interpreter::execute(self, &card.actions, player_id, &[]).await?;

            self.broadcast_positions();
            self.pause(self.config.pacing.after_surprise()).await?;
        }
    }

    /// Ask `player_id` a random question and judge the answer.
    async fn question_pipeline(&mut self, player_id: &str) -> Result<bool, Halt> {
        let (card, timer) = {
            let catalog = self.catalog.as_ref().ok_or(Halt::MatchClosed)?;
            let idx = self.rng.pick(catalog.questions.len());
            (catalog.questions[idx].clone(), catalog.timer)
        };
        let session = self.player(player_id).ok_or(Halt::PlayerGone)?.session.clone();

        self.emit(Outbound::BroadcastExcept {
            exclude: session.clone(),
            event: ServerEvent::PlayerTookQuestion {
                player_id: player_id.to_string(),
                title: card.title.clone(),
                question: card.question.clone(),
            },
        });

        let prompt = ServerEvent::AnswerQuestion {
            title: card.title.clone(),
            question: card.question.clone(),
            time_limit_secs: timer.enabled.then_some(timer.seconds),
        };
        self.send_to(&session, prompt.clone());

        let now = Instant::now();
        let deadline = timer
            .enabled
            .then(|| now.checked_add(Duration::from_secs(timer.seconds)))
            .flatten();
        let warning = self.config.pacing.timer_warning_secs;
        let warn_at = deadline
            .filter(|_| timer.seconds > warning)
            .and_then(|d| d.checked_sub(Duration::from_secs(warning)));

        let awaiting = Awaiting {
            player_id: player_id.to_string(),
            kind: ReplyKind::Answer,
            prompt,
        };
        let answer = match self.await_reply(awaiting, deadline, warn_at).await? {
            Some(Reply::Answer(text)) => Some(text),
            _ => None,
        };

        let Some(text) = answer else {
            tracing::info!(player = %player_id, "answer timed out");
            self.broadcast(ServerEvent::PlayerAnsweredQuestion {
                player_id: player_id.to_string(),
                answer: String::new(),
                correct: false,
            });
            self.broadcast(ServerEvent::PlayerPassedTurn {
                player_id: player_id.to_string(),
            });
            return Ok(false);
        };

        let correct = card.is_correct(&text);
        tracing::info!(player = %player_id, answer = %text, correct, "question answered");
        self.broadcast(ServerEvent::PlayerAnsweredQuestion {
            player_id: player_id.to_string(),
            answer: text,
            correct,
        });
        if correct {
            self.pause(self.config.pacing.correct_answer()).await?;
        }
        Ok(correct)
    }

    fn roll_for(&mut self, player_id: &str) -> u8 {
        let value = self.rng.roll_die();
        self.broadcast(ServerEvent::PlayerRolledDie {
            player_id: player_id.to_string(),
            value,
        });
        value
    }

    async fn pick_enemy(&mut self, player_id: &str) -> Result<PlayerId, Halt> {
        let session = self.player(player_id).ok_or(Halt::PlayerGone)?.session.clone();
        let candidates: Vec<PlayerSummary> = self
            .players
            .iter()
            .filter(|p| p.id != player_id && p.connected)
            .map(Player::summary)
            .collect();
        let prompt = ServerEvent::ChooseEnemy { candidates };
        self.send_to(&session, prompt.clone());

        let awaiting = Awaiting {
            player_id: player_id.to_string(),
            kind: ReplyKind::Choice,
            prompt,
        };
        let chosen = match self.await_reply(awaiting, None, None).await? {
            Some(Reply::Choice(id)) => id,
            _ => String::new(),
        };

        let valid = chosen != player_id
            && self
                .player(&chosen)
                .is_some_and(|p| p.connected);
        if !valid {
            let err = MatchError::InvalidChoice(chosen);
            tracing::warn!(player = %player_id, error = %err, "enemy choice rejected, surprise card stalled");
            return Err(self.stall(player_id).await);
        }

        tracing::info!(player = %player_id, enemy = %chosen, "enemy chosen");
        self.broadcast(ServerEvent::PlayerChoseEnemy {
            player_id: player_id.to_string(),
            enemy_id: chosen.clone(),
        });
        Ok(chosen)
    }

    /// Win check over every player, after a full turn.
    fn check_for_winner(&mut self) {
        let Some(winner) = self.players.iter().find(|p| p.has_won()) else {
            return;
        };
        tracing::info!(player = %winner.id, name = %winner.name, "player won");
        self.broadcast(ServerEvent::PlayerWon {
            player_id: winner.id.clone(),
            name: winner.name.clone(),
        });
        self.phase = MatchPhase::Ended;
        self.teardown_at = Some(Instant::now() + self.config.pacing.win_teardown());
    }

    fn advance_turn(&mut self) {
        if self.phase != MatchPhase::Running {
            return;
        }
        if !std::mem::take(&mut self.turn_player_removed) {
            self.turn += 1;
        }
        if self.turn >= self.players.len() {
            self.turn = 0;
        }
    }
}

impl ActionHost for MatchServer {
    fn tile_count(&self) -> usize {
        self.board.as_ref().map_or(0, Board::tile_count)
    }

    fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.find_player_mut(id)
    }

    fn connected_others(&self, id: &str) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.id != id && p.connected)
            .map(|p| p.id.clone())
            .collect()
    }

    async fn take_question(&mut self, id: &str) -> Result<bool, Halt> {
        self.question_pipeline(id).await
    }

    async fn roll_die(&mut self, id: &str) -> Result<u8, Halt> {
        self.ensure_running()?;
        Ok(self.roll_for(id))
    }

    async fn choose_enemy(&mut self, id: &str) -> Result<PlayerId, Halt> {
        self.pick_enemy(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::PacingConfig;
    use crate::engine::random::ScriptedRandom;
    use crate::game::board::required_tile_count;

    fn server() -> MatchServer {
        let config = ServerConfig {
            pacing: PacingConfig::instant(),
            ..ServerConfig::default()
        };
        let (server, _handle) = MatchServer::new(config, Box::new(ScriptedRandom::new(vec![], vec![])));
        server
    }

    fn open_server(players: usize) -> MatchServer {
        let mut s = server();
        s.board = Some(Board::new(15, &vec![1u8; required_tile_count(15)]).unwrap());
        s.phase = MatchPhase::Open;
        for i in 0..players {
            s.join(&format!("s{}", i), &format!("Player{}", i), "owl").unwrap();
        }
        s
    }

    #[test]
    fn test_join_validation() {
        let mut s = open_server(1);
        assert!(matches!(
            s.join("s9", "player0", "fox"),
            Err(MatchError::InvalidJoin(_))
        ));
        assert!(matches!(s.join("s9", "Bob", "fox"), Err(MatchError::InvalidJoin(_))));
        assert!(matches!(
            s.join("s9", "Robert", "dragon"),
            Err(MatchError::InvalidJoin(_))
        ));
        assert!(matches!(
            s.join("s0", "Robert", "fox"),
            Err(MatchError::InvalidJoin(_))
        ));
        assert!(s.join("s9", "Robert", "2").is_ok());
        assert_eq!(s.players[1].avatar, Avatar::Turtle);
        assert_eq!(s.players[1].position, 0);
    }

    #[test]
    fn test_join_trims_name_before_validation() {
        let mut s = open_server(0);
        assert!(matches!(
            s.join("s0", "  Bob", "owl"),
            Err(MatchError::InvalidJoin(_))
        ));
        assert!(s.players.is_empty());

        s.join("s0", "  Bobby ", "owl").unwrap();
        assert_eq!(s.players[0].name, "Bobby");
        assert!(matches!(
            s.join("s1", "bobby   ", "fox"),
            Err(MatchError::InvalidJoin(_))
        ));
    }

    #[test]
    fn test_name_availability_trims() {
        let mut s = open_server(1);
        let available = |s: &mut MatchServer, name: &str| {
            let (tx, mut rx) = tokio::sync::oneshot::channel();
            s.handle_command(Command::IsNameAvailable {
                name: name.into(),
                reply: tx,
            });
            rx.try_recv().unwrap()
        };
        assert!(!available(&mut s, "  Bob"));
        assert!(!available(&mut s, " player0 "));
        assert!(available(&mut s, " Carol "));
    }

    #[test]
    fn test_join_requires_open_match() {
        let mut s = server();
        assert_eq!(
            s.join("s0", "Alice", "owl"),
            Err(MatchError::InvalidState {
                expected: MatchPhase::Open,
                actual: MatchPhase::Closed,
            })
        );
    }

    #[test]
    fn test_start_needs_two_players() {
        let mut s = open_server(1);
        assert_eq!(s.start_match(), Err(MatchError::NotEnoughPlayers(MIN_PLAYERS)));
        s.join("s1", "Player1", "cat").unwrap();
        assert!(s.start_match().is_ok());
        assert_eq!(s.phase(), MatchPhase::Running);
    }

    #[test]
    fn test_turn_cursor_after_earlier_player_removed() {
        let mut s = open_server(3);
        s.phase = MatchPhase::Running;
        s.turn = 2;
        s.players[0].connected = false;
        let (id, session) = (s.players[0].id.clone(), s.players[0].session.clone());
        s.expire_grace(&id, &session);

        assert_eq!(s.players.len(), 2);
        assert_eq!(s.turn, 1);
        s.advance_turn();
        assert_eq!(s.turn, 0);
    }

    #[test]
    fn test_turn_cursor_after_current_player_removed() {
        let mut s = open_server(3);
        s.phase = MatchPhase::Running;
        s.turn = 1;
        s.players[1].connected = false;
        let (id, session) = (s.players[1].id.clone(), s.players[1].session.clone());
        s.expire_grace(&id, &session);

        assert!(s.turn_player_removed);
        s.advance_turn();
        assert_eq!(s.turn, 1);
        assert_eq!(s.players[s.turn].name, "Player2");
    }

    #[test]
    fn test_grace_ignored_after_reconnect() {
        let mut s = open_server(2);
        s.players[0].connected = false;
        let (id, old_session) = (s.players[0].id.clone(), s.players[0].session.clone());
        s.reconnect("s7", &id).unwrap();
        s.expire_grace(&id, &old_session);
        assert_eq!(s.players.len(), 2);
        assert_eq!(s.players[0].session, "s7");
    }

    #[test]
    fn test_reconnect_rejects_live_player_on_other_session() {
        let mut s = open_server(2);
        let id = s.players[0].id.clone();
        assert!(matches!(s.reconnect("s7", &id), Err(MatchError::InvalidJoin(_))));
        assert!(s.reconnect("s0", &id).is_ok());
        assert!(matches!(
            s.reconnect("s7", "nobody"),
            Err(MatchError::UnknownPlayer(_))
        ));
    }

    #[test]
    fn test_reply_only_from_awaited_player() {
        let mut s = open_server(2);
        s.awaiting = Some(Awaiting {
            player_id: s.players[0].id.clone(),
            kind: ReplyKind::Answer,
            prompt: ServerEvent::TenSecondsLeft,
        });

        s.accept_reply("s1", ReplyKind::Answer, Reply::Answer("x".into()));
        assert!(s.reply.is_none());
        s.accept_reply("s0", ReplyKind::Choice, Reply::Choice("x".into()));
        assert!(s.reply.is_none());
        s.accept_reply("s0", ReplyKind::Answer, Reply::Answer("x".into()));
        assert_eq!(s.reply, Some(Reply::Answer("x".into())));
        assert!(s.awaiting.is_none());
    }

    #[test]
    fn test_winner_ends_match() {
        let mut s = open_server(2);
        s.phase = MatchPhase::Running;
        s.players[1].position = 38;
        s.players[1].move_by(4, 40);
        s.check_for_winner();
        assert_eq!(s.phase(), MatchPhase::Ended);
        assert!(s.teardown_at.is_some());
    }

    #[test]
    fn test_backward_to_start_is_not_a_win() {
        let mut s = open_server(2);
        s.phase = MatchPhase::Running;
        s.players[1].position = 2;
        s.players[1].move_by(-3, 40);
        s.check_for_winner();
        assert_eq!(s.phase(), MatchPhase::Running);
    }

    #[test]
    fn test_end_match_resets_state() {
        let mut s = open_server(2);
        let mut rx = s.event_tx.subscribe();
        s.end_match();
        assert_eq!(s.phase(), MatchPhase::Closed);
        assert!(s.players.is_empty());
        assert!(s.board.is_none());

        let mut closed = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Outbound::Disconnect { session } = msg {
                closed.push(session);
            }
        }
        assert_eq!(closed, vec!["s0".to_string(), "s1".to_string()]);
    }
}
