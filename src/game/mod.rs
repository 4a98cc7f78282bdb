//! Trivia board game rules: board, players, cards and the match actor.

pub mod answer;
pub mod board;
pub mod cards;
pub mod interpreter;
pub mod orchestrator;
pub mod player;
