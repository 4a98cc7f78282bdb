//! Core data types shared by the match engine and the transport.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type PlayerId = String;
pub type SessionId = String;

/// Token a player picks on join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Avatar {
    Owl,
    Fox,
    Turtle,
    Rabbit,
    Cat,
    Frog,
}

impl Avatar {
    pub const ALL: [Avatar; 6] = [
        Avatar::Owl,
        Avatar::Fox,
        Avatar::Turtle,
        Avatar::Rabbit,
        Avatar::Cat,
        Avatar::Frog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Avatar::Owl => "owl",
            Avatar::Fox => "fox",
            Avatar::Turtle => "turtle",
            Avatar::Rabbit => "rabbit",
            Avatar::Cat => "cat",
            Avatar::Frog => "frog",
        }
    }
}

impl fmt::Display for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either the lowercase name or the numeric index used by older clients.
impl FromStr for Avatar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(idx) = s.parse::<usize>() {
            return Avatar::ALL
                .get(idx)
                .copied()
                .ok_or_else(|| format!("unknown avatar index: {}", idx));
        }
        Avatar::ALL
            .iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown avatar: {}", s))
    }
}

/// Lifecycle of the single in-process match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Closed,
    /// Accepting joins.
    Open,
    Running,
    /// A player won; teardown is scheduled.
    Ended,
}

/// Public view of a player, as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Avatar,
    pub position: usize,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseKind {
    Luck,
    BadLuck,
}

/// Everything the match pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    InitialGameInfo {
        board_size: usize,
        tiles: Vec<u8>,
        players: Vec<PlayerSummary>,
    },
    MatchOpen,
    MatchEnded,
    PlayerJoined {
        player: PlayerSummary,
    },
    PlayerDisconnected {
        player_id: PlayerId,
        name: String,
    },
    PlayerInfo {
        player_id: PlayerId,
        position: usize,
    },
    PlayersUpdate {
        positions: HashMap<PlayerId, usize>,
    },
    PlayerRolledDie {
        player_id: PlayerId,
        value: u8,
    },
    PlayerPassedTurn {
        player_id: PlayerId,
    },
    PlayerWon {
        player_id: PlayerId,
        name: String,
    },
    PlayerTookQuestion {
        player_id: PlayerId,
        title: String,
        question: String,
    },
    PlayerTookSurpriseCard {
        player_id: PlayerId,
        kind: SurpriseKind,
        text: String,
    },
    PlayerAnsweredQuestion {
        player_id: PlayerId,
        answer: String,
        correct: bool,
    },
    PlayerChoseEnemy {
        player_id: PlayerId,
        enemy_id: PlayerId,
    },
    /// Prompt sent only to the answering player.
    AnswerQuestion {
        title: String,
        question: String,
        time_limit_secs: Option<u64>,
    },
    /// Prompt sent only to the choosing player.
    ChooseEnemy {
        candidates: Vec<PlayerSummary>,
    },
    TenSecondsLeft,
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::InitialGameInfo { .. } => "initial_game_info",
            ServerEvent::MatchOpen => "match_open",
            ServerEvent::MatchEnded => "match_ended",
            ServerEvent::PlayerJoined { .. } => "player_joined",
            ServerEvent::PlayerDisconnected { .. } => "player_disconnected",
            ServerEvent::PlayerInfo { .. } => "player_info",
            ServerEvent::PlayersUpdate { .. } => "players_update",
            ServerEvent::PlayerRolledDie { .. } => "player_rolled_die",
            ServerEvent::PlayerPassedTurn { .. } => "player_passed_turn",
            ServerEvent::PlayerWon { .. } => "player_won",
            ServerEvent::PlayerTookQuestion { .. } => "player_took_question",
            ServerEvent::PlayerTookSurpriseCard { .. } => "player_took_surprise_card",
            ServerEvent::PlayerAnsweredQuestion { .. } => "player_answered_question",
            ServerEvent::PlayerChoseEnemy { .. } => "player_chose_enemy",
            ServerEvent::AnswerQuestion { .. } => "answer_question",
            ServerEvent::ChooseEnemy { .. } => "choose_enemy",
            ServerEvent::TenSecondsLeft => "ten_seconds_left",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_parse() {
        assert_eq!("fox".parse::<Avatar>(), Ok(Avatar::Fox));
        assert_eq!("Owl".parse::<Avatar>(), Ok(Avatar::Owl));
        assert_eq!("2".parse::<Avatar>(), Ok(Avatar::Turtle));
        assert!("9".parse::<Avatar>().is_err());
        assert!("dragon".parse::<Avatar>().is_err());
    }

    #[test]
    fn test_event_serialization_tag() {
        let ev = ServerEvent::PlayerRolledDie {
            player_id: "p0".into(),
            value: 4,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.event_type());
        assert_eq!(json["value"], 4);
    }
}
