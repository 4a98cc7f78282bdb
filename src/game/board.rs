//! Board model: the triangular loop of tiles players walk around.
//!
//! A board with `size` tiles per side has `size + (size - 3) * 2 + 1` tiles
//! on its perimeter path. Tile 0 is where everybody starts and where a lap
//! is won.

use serde::{Deserialize, Serialize};

use crate::engine::error::MatchError;

pub const MIN_BOARD_SIZE: usize = 5;
pub const MAX_BOARD_SIZE: usize = 101;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Start,
    Empty,
    Surprise,
}

impl TileKind {
    pub fn to_wire(self) -> u8 {
        match self {
            TileKind::Start => 0,
            TileKind::Empty => 1,
            TileKind::Surprise => 2,
        }
    }

    pub fn from_wire(v: u8) -> Option<TileKind> {
        match v {
            0 => Some(TileKind::Start),
            1 => Some(TileKind::Empty),
            2 => Some(TileKind::Surprise),
            _ => None,
        }
    }
}

/// Number of tiles on the track of a board with `size` tiles per side.
pub fn required_tile_count(size: usize) -> usize {
    size + size.saturating_sub(3) * 2 + 1
}

/// Wire form of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedBoard {
    pub board_size: usize,
    pub tiles: Vec<u8>,
}

/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    tiles: Vec<TileKind>,
}

impl Board {
    /// Validate size bounds, parity, tile count and tile codes.
    /// Nothing is built unless every check passes.
    pub fn new(size: usize, tiles: &[u8]) -> Result<Self, MatchError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
            return Err(MatchError::InvalidBoardConfig(format!(
                "board size {} outside {}..={}",
                size, MIN_BOARD_SIZE, MAX_BOARD_SIZE
            )));
        }
        if size % 2 == 0 {
            return Err(MatchError::InvalidBoardConfig(format!(
                "board size {} must be odd",
                size
            )));
        }
        let expected = required_tile_count(size);
        if tiles.len() != expected {
            return Err(MatchError::InvalidBoardConfig(format!(
                "board size {} needs {} tiles, got {}",
                size,
                expected,
                tiles.len()
            )));
        }

        let tiles = tiles
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                TileKind::from_wire(t).ok_or_else(|| {
                    MatchError::InvalidBoardConfig(format!("unknown tile code {} at {}", t, i))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { size, tiles })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, position: usize) -> Option<TileKind> {
        self.tiles.get(position).copied()
    }

    /// Out-of-range positions are never surprise tiles.
    pub fn is_surprise_tile(&self, position: usize) -> bool {
        self.tile(position) == Some(TileKind::Surprise)
    }

    pub fn serialize(&self) -> SerializedBoard {
        SerializedBoard {
            board_size: self.size,
            tiles: self.tiles.iter().map(|t| t.to_wire()).collect(),
        }
    }
}
