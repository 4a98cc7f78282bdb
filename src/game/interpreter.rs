//! Action tree interpreter for surprise cards.
//!
//! [`execute`] walks a list of [`ActionNode`]s against a target player and
//! an optional set of extra targets. Only the first node of a list is run;
//! its siblings are ignored for that pass. Branching nodes recurse into their
//! children, which is where the tree actually fans out.
//!
//! Anything that needs the outside world (a question answered, a die rolled,
//! an opponent picked) goes through [`ActionHost`], which the match
//! orchestrator implements.

use std::future::Future;
use std::pin::Pin;

use crate::engine::error::Halt;
use crate::engine::models::PlayerId;
use crate::game::cards::ActionNode;
use crate::game::player::Player;

/// Services the interpreter needs from whoever owns the players.
pub trait ActionHost: Send {
    /// Length of the board track.
    fn tile_count(&self) -> usize;

    fn player_mut(&mut self, id: &str) -> Option<&mut Player>;

    /// Every connected player except `id`, in join order.
    fn connected_others(&self, id: &str) -> Vec<PlayerId>;

    /// Run the question pipeline for `id`; `true` when answered correctly.
    fn take_question(&mut self, id: &str) -> impl Future<Output = Result<bool, Halt>> + Send;

    /// Roll 1..=6 on behalf of `id` (and announce it).
    fn roll_die(&mut self, id: &str) -> impl Future<Output = Result<u8, Halt>> + Send;

    /// Ask `id` to pick a connected opponent. Only returns once a valid pick
    /// arrives or the wait is halted.
    fn choose_enemy(&mut self, id: &str) -> impl Future<Output = Result<PlayerId, Halt>> + Send;
}

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Halt>> + Send + 'a>>;

/// Execute `actions` with `target` as the acting player.
///
/// Direct effects apply to `extra_targets` when non-empty, otherwise to
/// `target` alone.
pub fn execute<'a, H: ActionHost>(
    host: &'a mut H,
    actions: &'a [ActionNode],
    target: &'a str,
    extra_targets: &'a [PlayerId],
) -> ExecFuture<'a> {
    Box::pin(async move {
        let Some(node) = actions.first() else {
            return Ok(());
        };
        if actions.len() > 1 {
            tracing::debug!(
                kind = node.kind(),
                skipped = actions.len() - 1,
                "running first action only"
            );
        }
        tracing::debug!(kind = node.kind(), player = %target, "running action");

        match node {
            ActionNode::Advance(_)
            | ActionNode::Back(_)
            | ActionNode::AdvanceMultiplier(_)
            | ActionNode::Pass(_) => {
                let tile_count = host.tile_count();
                if extra_targets.is_empty() {
                    apply_direct(host, node, target, tile_count);
                } else {
                    for id in extra_targets {
                        apply_direct(host, node, id, tile_count);
                    }
                }
                Ok(())
            }

            ActionNode::Others(children) => {
                let others = host.connected_others(target);
                if others.is_empty() {
                    tracing::info!(player = %target, "no other connected players, skipping");
                    return Ok(());
                }
                execute(host, children, target, &others).await
            }

            ActionNode::NextRound(children) => {
                if let Some(player) = host.player_mut(target) {
                    player.install_next_round(children.clone());
                }
                Ok(())
            }

            ActionNode::ChooseEnemy(children) => {
                let enemy = host.choose_enemy(target).await?;
                let chosen = [enemy];
                execute(host, children, target, &chosen).await
            }

            ActionNode::TakeQuestion {
                on_correct,
                on_wrong,
            } => {
                let correct = host.take_question(target).await?;
                let branch = if correct { on_correct } else { on_wrong };
                execute(host, branch, target, &[]).await
            }

            ActionNode::RollDie {
                on_bigger,
                on_smaller,
                on_equal,
                thresholds,
            } => {
                let roll = host.roll_die(target).await?;
                if thresholds.fires_bigger(roll) {
                    execute(host, on_bigger, target, &[]).await?;
                }
                if thresholds.fires_smaller(roll) {
                    execute(host, on_smaller, target, &[]).await?;
                }
                if thresholds.fires_equal(roll) {
                    execute(host, on_equal, target, &[]).await?;
                }
                Ok(())
            }
        }
    })
}

fn apply_direct<H: ActionHost>(host: &mut H, node: &ActionNode, id: &str, tile_count: usize) {
    let Some(player) = host.player_mut(id) else {
        tracing::debug!(player = %id, "action target no longer in match");
        return;
    };
    match node {
        ActionNode::Advance(n) | ActionNode::Back(n) => {
            player.move_by(*n, tile_count);
            tracing::info!(player = %player.name, delta = n, position = player.position, "moved by card");
        }
        ActionNode::AdvanceMultiplier(n) => player.advance_multiplier = *n,
        ActionNode::Pass(flag) => player.set_pending_pass(*flag),
        _ => {}
    }
}

/// Run the continuation a NEXT_ROUND action left on `id`, if any.
/// The slot is cleared before running so it fires once.
pub async fn run_next_round<H: ActionHost>(host: &mut H, id: &str) -> Result<(), Halt> {
    let pending = host.player_mut(id).and_then(|p| p.take_next_round());
    match pending {
        Some(actions) => execute(host, &actions, id, &[]).await,
        None => Ok(()),
    }
}
