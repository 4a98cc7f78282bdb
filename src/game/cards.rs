//! Card catalog: question cards and surprise cards with their action trees.
//!
//! The catalog is built once per match from a JSON card definition document.
//! Each surprise card's scripted `actions` block is compiled into a tree of
//! [`ActionNode`]s. Nodes are immutable after compilation; executing them
//! only ever mutates the players they target.

use std::path::Path;

use serde::Deserialize;

use crate::engine::error::MatchError;
use crate::engine::models::SurpriseKind;
use crate::game::answer::{self, MatchMode};

/// Longest answer timer a card document may ask for.
pub const MAX_TIMER_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// Card definition document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFile {
    #[serde(default)]
    pub use_timer: bool,
    /// Seconds a player has to answer when `use_timer` is set.
    #[serde(default)]
    pub timer: u64,
    pub cards: CardLists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardLists {
    #[serde(default)]
    pub questions: Vec<QuestionDef>,
    #[serde(default)]
    pub surprise: Vec<SurpriseDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDef {
    #[serde(default)]
    pub title: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub mark_similar_as_correct: bool,
    #[serde(default)]
    pub correct_if_correct_answer_is_on_user_answer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurpriseDef {
    #[serde(rename = "type")]
    pub kind: SurpriseKind,
    pub text: String,
    #[serde(default)]
    pub actions: BlockDef,
}

/// Effects that apply directly to their targets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimpleDef {
    pub advance: Option<i32>,
    pub back: Option<i32>,
    pub advance_multiplier: Option<i32>,
    pub pass: Option<bool>,
}

/// A full scripted outcome block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockDef {
    #[serde(flatten)]
    pub simple: SimpleDef,
    pub others: Option<SimpleDef>,
    pub next_round: Option<SimpleDef>,
    pub choose_enemy: Option<SimpleDef>,
    pub take_question: Option<TakeQuestionDef>,
    pub roll_die: Option<RollDieDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TakeQuestionDef {
    pub if_correct: Option<Box<BlockDef>>,
    pub if_wrong: Option<Box<BlockDef>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollDieDef {
    pub if_bigger: Option<DieBranchDef>,
    pub if_smaller: Option<DieBranchDef>,
    pub if_equal: Option<DieBranchDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DieBranchDef {
    #[serde(default)]
    pub target: u8,
    #[serde(rename = "do", default)]
    pub actions: Box<BlockDef>,
}

// ---------------------------------------------------------------------------
// Compiled cards
// ---------------------------------------------------------------------------

/// Thresholds a die roll is compared against. A branch fires when its
/// comparison holds; several may fire for the same roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DieThresholds {
    pub bigger: u8,
    pub smaller: u8,
    pub equal: u8,
}

impl DieThresholds {
    pub fn fires_bigger(&self, roll: u8) -> bool {
        roll >= self.bigger
    }

    pub fn fires_smaller(&self, roll: u8) -> bool {
        roll <= self.smaller
    }

    pub fn fires_equal(&self, roll: u8) -> bool {
        roll == self.equal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionNode {
    Advance(i32),
    Back(i32),
    AdvanceMultiplier(i32),
    Pass(bool),
    /// Children run against every other connected player.
    Others(Vec<ActionNode>),
    /// Children run at the start of the target's next turn.
    NextRound(Vec<ActionNode>),
    /// Children run against an opponent the target picks.
    ChooseEnemy(Vec<ActionNode>),
    TakeQuestion {
        on_correct: Vec<ActionNode>,
        on_wrong: Vec<ActionNode>,
    },
    RollDie {
        on_bigger: Vec<ActionNode>,
        on_smaller: Vec<ActionNode>,
        on_equal: Vec<ActionNode>,
        thresholds: DieThresholds,
    },
}

impl ActionNode {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionNode::Advance(_) => "ADVANCE",
            ActionNode::Back(_) => "BACK",
            ActionNode::AdvanceMultiplier(_) => "ADVANCE_MULTIPLIER",
            ActionNode::Pass(_) => "PASS",
            ActionNode::Others(_) => "OTHERS",
            ActionNode::NextRound(_) => "NEXT_ROUND",
            ActionNode::ChooseEnemy(_) => "CHOOSE_ENEMY",
            ActionNode::TakeQuestion { .. } => "TAKE_QUESTION",
            ActionNode::RollDie { .. } => "ROLL_DIE",
        }
    }
}

/// Compile the direct effects in fixed order: advance, back, multiplier, pass.
/// Zero amounts and `false` passes produce nothing.
///
/// A block holding only `pass: true` compiles to a lone PASS at every level,
/// including a card's top-level block. Older decks had a top-level lone pass
/// silently dropped; here it makes the target skip their next turn.
fn compile_simple(def: &SimpleDef) -> Vec<ActionNode> {
    let mut nodes = Vec::new();
    if let Some(n) = def.advance.filter(|n| *n != 0) {
        nodes.push(ActionNode::Advance(n.abs()));
    }
    if let Some(n) = def.back.filter(|n| *n != 0) {
        nodes.push(ActionNode::Back(-n.abs()));
    }
    if let Some(n) = def.advance_multiplier.filter(|n| *n != 0) {
        nodes.push(ActionNode::AdvanceMultiplier(n));
    }
    if def.pass == Some(true) {
        nodes.push(ActionNode::Pass(true));
    }
    nodes
}

fn compile_optional(def: Option<&BlockDef>) -> Vec<ActionNode> {
    def.map(compile_block).unwrap_or_default()
}

/// Compile a block: direct effects first, then OTHERS, NEXT_ROUND,
/// CHOOSE_ENEMY, TAKE_QUESTION, ROLL_DIE. Absent blocks give empty lists.
pub fn compile_block(def: &BlockDef) -> Vec<ActionNode> {
    let mut nodes = compile_simple(&def.simple);

    if let Some(others) = &def.others {
        nodes.push(ActionNode::Others(compile_simple(others)));
    }
    if let Some(next) = &def.next_round {
        nodes.push(ActionNode::NextRound(compile_simple(next)));
    }
    if let Some(choose) = &def.choose_enemy {
        nodes.push(ActionNode::ChooseEnemy(compile_simple(choose)));
    }
    if let Some(tq) = &def.take_question {
        nodes.push(ActionNode::TakeQuestion {
            on_correct: compile_optional(tq.if_correct.as_deref()),
            on_wrong: compile_optional(tq.if_wrong.as_deref()),
        });
    }
    if let Some(rd) = &def.roll_die {
        nodes.push(ActionNode::RollDie {
            on_bigger: compile_optional(rd.if_bigger.as_ref().map(|b| &*b.actions)),
            on_smaller: compile_optional(rd.if_smaller.as_ref().map(|b| &*b.actions)),
            on_equal: compile_optional(rd.if_equal.as_ref().map(|b| &*b.actions)),
            thresholds: DieThresholds {
                bigger: rd.if_bigger.as_ref().map_or(0, |b| b.target),
                smaller: rd.if_smaller.as_ref().map_or(0, |b| b.target),
                equal: rd.if_equal.as_ref().map_or(0, |b| b.target),
            },
        });
    }

    nodes
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCard {
    pub title: String,
    pub question: String,
    pub answer: String,
    pub aliases: Vec<String>,
    pub mode: MatchMode,
}

impl QuestionCard {
    pub fn is_correct(&self, submitted: &str) -> bool {
        answer::is_correct(submitted, &self.answer, &self.aliases, self.mode)
    }
}

impl From<&QuestionDef> for QuestionCard {
    fn from(def: &QuestionDef) -> Self {
        QuestionCard {
            title: def.title.clone(),
            question: def.question.clone(),
            answer: def.answer.clone(),
            aliases: def.aliases.clone(),
            mode: MatchMode {
                normalized: def.mark_similar_as_correct,
                containment: def.correct_if_correct_answer_is_on_user_answer,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurpriseCard {
    pub kind: SurpriseKind,
    pub text: String,
    pub actions: Vec<ActionNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub enabled: bool,
    pub seconds: u64,
}

/// Immutable set of cards for one match.
#[derive(Debug, Clone)]
pub struct CardCatalog {
    pub questions: Vec<QuestionCard>,
    pub surprises: Vec<SurpriseCard>,
    pub timer: TimerConfig,
}

impl CardCatalog {
    pub fn from_file(file: &CardFile) -> Result<Self, MatchError> {
        if file.cards.questions.is_empty() {
            return Err(MatchError::CatalogLoad("no question cards".into()));
        }
        if file.cards.surprise.is_empty() {
            return Err(MatchError::CatalogLoad("no surprise cards".into()));
        }
        if file.use_timer && file.timer == 0 {
            return Err(MatchError::CatalogLoad("timer enabled with 0 seconds".into()));
        }
        if file.use_timer && file.timer > MAX_TIMER_SECS {
            return Err(MatchError::CatalogLoad(format!(
                "timer of {} seconds exceeds {}",
                file.timer, MAX_TIMER_SECS
            )));
        }

        let questions = file.cards.questions.iter().map(QuestionCard::from).collect();
        let surprises = file
            .cards
            .surprise
            .iter()
            .map(|def| SurpriseCard {
                kind: def.kind,
                text: def.text.clone(),
                actions: compile_block(&def.actions),
            })
            .collect();

        Ok(Self {
            questions,
            surprises,
            timer: TimerConfig {
                enabled: file.use_timer,
                seconds: file.timer,
            },
        })
    }

    pub fn from_json(json: &str) -> Result<Self, MatchError> {
        let file: CardFile =
            serde_json::from_str(json).map_err(|e| MatchError::CatalogLoad(e.to_string()))?;
        Self::from_file(&file)
    }

    pub fn load(path: &Path) -> Result<Self, MatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatchError::CatalogLoad(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"{
        "useTimer": true,
        "timer": 30,
        "cards": {
            "questions": [
                { "title": "Ciência", "question": "Fórmula da água?", "answer": "H2O",
                  "markSimilarAsCorrect": true, "correctIfCorrectAnswerIsOnUserAnswer": false }
            ],
            "surprise": [
                { "type": "luck", "text": "Avance 3 casas", "actions": { "advance": 3 } },
                { "type": "bad_luck", "text": "Todos os outros avançam",
                  "actions": { "others": { "advance": 2 } } },
                { "type": "luck", "text": "Responda",
                  "actions": { "take_question": { "if_correct": { "advance": 4 },
                                                   "if_wrong": { "back": 2 } } } },
                { "type": "luck", "text": "Role o dado",
                  "actions": { "roll_die": { "if_bigger": { "target": 4, "do": { "advance": 5 } },
                                             "if_equal": { "target": 3, "do": { "pass": true } } } } },
                { "type": "bad_luck", "text": "Várias", "actions": { "back": 3, "pass": true,
                  "next_round": { "advance_multiplier": 2 }, "choose_enemy": { "back": 1 } } }
            ]
        }
    }"#;

    #[test]
    fn test_load_catalog() {
        let catalog = CardCatalog::from_json(DECK).unwrap();
        assert_eq!(catalog.questions.len(), 1);
        assert_eq!(catalog.surprises.len(), 5);
        assert_eq!(catalog.timer, TimerConfig { enabled: true, seconds: 30 });
        assert!(catalog.questions[0].mode.normalized);
        assert!(catalog.questions[0].is_correct("h2o"));
    }

    #[test]
    fn test_compile_simple_and_others() {
        let catalog = CardCatalog::from_json(DECK).unwrap();
        assert_eq!(catalog.surprises[0].actions, vec![ActionNode::Advance(3)]);
        assert_eq!(
            catalog.surprises[1].actions,
            vec![ActionNode::Others(vec![ActionNode::Advance(2)])]
        );
    }

    #[test]
    fn test_compile_take_question_branches() {
        let catalog = CardCatalog::from_json(DECK).unwrap();
        assert_eq!(
            catalog.surprises[2].actions,
            vec![ActionNode::TakeQuestion {
                on_correct: vec![ActionNode::Advance(4)],
                on_wrong: vec![ActionNode::Back(-2)],
            }]
        );
    }

    #[test]
    fn test_compile_roll_die_missing_branch_is_empty() {
        let catalog = CardCatalog::from_json(DECK).unwrap();
        match &catalog.surprises[3].actions[0] {
            ActionNode::RollDie {
                on_bigger,
                on_smaller,
                on_equal,
                thresholds,
            } => {
                assert_eq!(on_bigger, &vec![ActionNode::Advance(5)]);
                assert!(on_smaller.is_empty());
                assert_eq!(on_equal, &vec![ActionNode::Pass(true)]);
                assert_eq!(
                    *thresholds,
                    DieThresholds {
                        bigger: 4,
                        smaller: 0,
                        equal: 3
                    }
                );
            }
            other => panic!("expected ROLL_DIE, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_order() {
        let catalog = CardCatalog::from_json(DECK).unwrap();
        let kinds: Vec<&str> = catalog.surprises[4].actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec!["BACK", "PASS", "NEXT_ROUND", "CHOOSE_ENEMY"]);
    }

    #[test]
    fn test_threshold_comparisons() {
        let t = DieThresholds {
            bigger: 4,
            smaller: 2,
            equal: 3,
        };
        assert!(t.fires_equal(3) && !t.fires_bigger(3) && !t.fires_smaller(3));
        assert!(t.fires_bigger(5) && !t.fires_smaller(5) && !t.fires_equal(5));
        assert!(t.fires_smaller(2) && !t.fires_bigger(2) && !t.fires_equal(2));
    }

    #[test]
    fn test_catalog_errors() {
        assert!(matches!(
            CardCatalog::from_json("not json"),
            Err(MatchError::CatalogLoad(_))
        ));
        let empty = r#"{ "useTimer": false, "timer": 0, "cards": { "questions": [], "surprise": [] } }"#;
        assert!(matches!(
            CardCatalog::from_json(empty),
            Err(MatchError::CatalogLoad(_))
        ));
        assert!(CardCatalog::load(Path::new("/no/such/deck.json")).is_err());
    }

    #[test]
    fn test_timer_bounds() {
        let deck = |timer: u64| {
            format!(
                r#"{{ "useTimer": true, "timer": {}, "cards": {{
                    "questions": [ {{ "title": "t", "question": "q", "answer": "a" }} ],
                    "surprise": [ {{ "type": "luck", "text": "x", "actions": {{ "advance": 1 }} }} ] }} }}"#,
                timer
            )
        };
        assert!(CardCatalog::from_json(&deck(MAX_TIMER_SECS)).is_ok());
        assert!(matches!(
            CardCatalog::from_json(&deck(MAX_TIMER_SECS + 1)),
            Err(MatchError::CatalogLoad(_))
        ));
        assert!(matches!(
            CardCatalog::from_json(&deck(u64::MAX)),
            Err(MatchError::CatalogLoad(_))
        ));
    }

    #[test]
    fn test_lone_top_level_pass_compiles() {
        let block: BlockDef = serde_json::from_str(r#"{ "pass": true }"#).unwrap();
        assert_eq!(compile_block(&block), vec![ActionNode::Pass(true)]);
        let block: BlockDef = serde_json::from_str(r#"{ "pass": false }"#).unwrap();
        assert!(compile_block(&block).is_empty());
    }

    #[test]
    fn test_nested_branches_compile() {
        let block: BlockDef = serde_json::from_str(
            r#"{ "roll_die": { "if_equal": { "target": 6, "do": {
                    "take_question": { "if_correct": { "advance": 2 },
                                       "if_wrong": { "roll_die": { "if_smaller": { "target": 1, "do": { "back": 1 } } } } } } } } }"#,
        )
        .unwrap();
        let nodes = compile_block(&block);
        let ActionNode::RollDie { on_equal, .. } = &nodes[0] else {
            panic!("expected ROLL_DIE");
        };
        let ActionNode::TakeQuestion { on_correct, on_wrong } = &on_equal[0] else {
            panic!("expected TAKE_QUESTION");
        };
        assert_eq!(on_correct, &vec![ActionNode::Advance(2)]);
        assert!(matches!(&on_wrong[0], ActionNode::RollDie { on_smaller, .. } if on_smaller == &vec![ActionNode::Back(-1)]));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        std::fs::write(&path, DECK).unwrap();
        let catalog = CardCatalog::load(&path).unwrap();
        assert_eq!(catalog.surprises.len(), 5);
    }
}
