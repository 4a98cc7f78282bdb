//! Source of randomness for die rolls and card draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Die rolls and uniform picks, behind a trait so matches can be replayed.
pub trait RandomSource: Send {
    /// Roll a six-sided die, 1..=6.
    fn roll_die(&mut self) -> u8;

    /// Pick a uniform index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl RandomSource for SeededRandom {
    fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays fixed die rolls and picks, cycling when exhausted.
/// Useful for tests and deterministic demos.
pub struct ScriptedRandom {
    rolls: Vec<u8>,
    picks: Vec<usize>,
    roll_idx: usize,
    pick_idx: usize,
}

impl ScriptedRandom {
    pub fn new(rolls: Vec<u8>, picks: Vec<usize>) -> Self {
        Self {
            rolls,
            picks,
            roll_idx: 0,
            pick_idx: 0,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn roll_die(&mut self) -> u8 {
        if self.rolls.is_empty() {
            return 1;
        }
        let v = self.rolls[self.roll_idx % self.rolls.len()];
        self.roll_idx += 1;
        v
    }

    fn pick(&mut self, len: usize) -> usize {
        if self.picks.is_empty() {
            return 0;
        }
        let v = self.picks[self.pick_idx % self.picks.len()];
        self.pick_idx += 1;
        v % len
    }
}
