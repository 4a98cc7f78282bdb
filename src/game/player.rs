//! Per-participant mutable game state.

use crate::engine::error::MatchError;
use crate::engine::models::{Avatar, PlayerId, PlayerSummary, SessionId};
use crate::game::cards::ActionNode;

pub const MIN_NAME_LEN: usize = 4;
pub const MAX_NAME_LEN: usize = 15;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Avatar,
    pub position: usize,
    /// Scales the magnitude of the next move, reset to 1 after it.
    pub advance_multiplier: i32,
    pending_pass: bool,
    /// Tile whose surprise card was already resolved during this visit.
    pub previous_surprise_tile: Option<usize>,
    pub connected: bool,
    /// Transport session currently bound to this player.
    pub session: SessionId,
    last_move_forward: bool,
    next_round: Option<Vec<ActionNode>>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, avatar: Avatar, session: SessionId) -> Self {
        Self {
            id,
            name,
            avatar,
            position: 0,
            advance_multiplier: 1,
            pending_pass: false,
            previous_surprise_tile: None,
            connected: true,
            session,
            last_move_forward: false,
            next_round: None,
        }
    }

    /// Name must be 4..=15 characters once trimmed, with no control characters.
    pub fn validate_name(name: &str) -> Result<(), MatchError> {
        let len = name.trim().chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return Err(MatchError::InvalidJoin(format!(
                "name must be {}-{} characters, got {}",
                MIN_NAME_LEN, MAX_NAME_LEN, len
            )));
        }
        if name.trim().is_empty() || name.chars().any(char::is_control) {
            return Err(MatchError::InvalidJoin("name contains invalid characters".into()));
        }
        Ok(())
    }

    /// Move `delta` tiles along a track of `tile_count` tiles.
    ///
    /// The multiplier scales magnitude only; direction always follows `delta`.
    /// Reaching or passing the end of the track lands exactly on tile 0.
    /// Moving backwards stops at tile 0 and never wraps.
    pub fn move_by(&mut self, delta: i32, tile_count: usize) {
        let mut step = i64::from(delta) * i64::from(self.advance_multiplier);
        if step.signum() != i64::from(delta.signum()) {
            step = -step;
        }

        let position = self.position as i64;
        let distance_to_wrap = tile_count as i64 - position;
        self.position = if step >= distance_to_wrap {
            0
        } else {
            (position + step).max(0) as usize
        };

        self.previous_surprise_tile = None;
        self.advance_multiplier = 1;
        self.last_move_forward = delta > 0;
    }

    pub fn last_move_forward(&self) -> bool {
        self.last_move_forward
    }

    /// Standing on tile 0 after a forward move.
    pub fn has_won(&self) -> bool {
        self.position == 0 && self.last_move_forward
    }

    pub fn set_pending_pass(&mut self, pass: bool) {
        self.pending_pass = pass;
    }

    /// Read-and-clear.
    pub fn take_pending_pass(&mut self) -> bool {
        std::mem::take(&mut self.pending_pass)
    }

    pub fn pending_pass(&self) -> bool {
        self.pending_pass
    }

    /// Replaces any continuation already waiting for the next turn.
    pub fn install_next_round(&mut self, actions: Vec<ActionNode>) {
        self.next_round = Some(actions);
    }

    /// Remove the continuation so it runs at most once.
    pub fn take_next_round(&mut self) -> Option<Vec<ActionNode>> {
        self.next_round.take()
    }

    pub fn has_next_round(&self) -> bool {
        self.next_round.is_some()
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar,
            position: self.position,
            connected: self.connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(position: usize) -> Player {
        let mut p = Player::new("p0".into(), "Alice".into(), Avatar::Owl, "s0".into());
        p.position = position;
        p
    }

    #[test]
    fn test_forward_overshoot_lands_on_start() {
        let mut p = player_at(39);
        p.move_by(5, 41);
        assert_eq!(p.position, 0);
        assert!(p.last_move_forward());
        assert!(p.has_won());
    }

    #[test]
    fn test_exact_wrap_lands_on_start() {
        let mut p = player_at(38);
        p.move_by(3, 41);
        assert_eq!(p.position, 0);
        assert!(p.has_won());
    }

    #[test]
    fn test_plain_forward_move() {
        let mut p = player_at(10);
        p.move_by(4, 41);
        assert_eq!(p.position, 14);
        assert!(!p.has_won());
    }

    #[test]
    fn test_back_does_not_wrap() {
        let mut p = player_at(10);
        p.move_by(-3, 41);
        assert_eq!(p.position, 7);
        assert!(!p.last_move_forward());

        let mut p = player_at(2);
        p.move_by(-5, 41);
        assert_eq!(p.position, 0);
        assert!(!p.has_won(), "backward landing on start is not a win");
    }

    #[test]
    fn test_multiplier_scales_and_resets() {
        let mut p = player_at(0);
        p.advance_multiplier = 3;
        p.move_by(2, 41);
        assert_eq!(p.position, 6);
        assert_eq!(p.advance_multiplier, 1);

        p.move_by(2, 41);
        assert_eq!(p.position, 8);
    }

    #[test]
    fn test_negative_multiplier_keeps_direction() {
        let mut p = player_at(10);
        p.advance_multiplier = -2;
        p.move_by(3, 41);
        assert_eq!(p.position, 16);

        p.advance_multiplier = -2;
        p.move_by(-3, 41);
        assert_eq!(p.position, 10);
    }

    #[test]
    fn test_move_clears_surprise_guard() {
        let mut p = player_at(5);
        p.previous_surprise_tile = Some(5);
        p.move_by(1, 41);
        assert_eq!(p.previous_surprise_tile, None);
    }

    #[test]
    fn test_pending_pass_read_and_clear() {
        let mut p = player_at(0);
        p.set_pending_pass(true);
        assert!(p.take_pending_pass());
        assert!(!p.take_pending_pass());
    }

    #[test]
    fn test_name_validation() {
        assert!(Player::validate_name("Ana").is_err());
        assert!(Player::validate_name("Anna").is_ok());
        assert!(Player::validate_name("João").is_ok());
        assert!(Player::validate_name("abcdefghijklmnop").is_err());
        assert!(Player::validate_name("    ").is_err());
        assert!(Player::validate_name("ab\ncd").is_err());
    }

    #[test]
    fn test_name_length_ignores_padding() {
        assert!(Player::validate_name("  Bob").is_err());
        assert!(Player::validate_name("Bob   ").is_err());
        assert!(Player::validate_name("  Bobby  ").is_ok());
    }
}
