//! Removes unreachable blocks and unused side-effect-free values.
use crate::traversal::{Action, Named, VisResult, Visitor};
use std::collections::{HashMap, HashSet};
use warp_ir::{
    BlockId, IrEnv, Method, MethodBody, MethodBuilder, Scope, ValueId,
};

/// Drops blocks the entry cannot reach and body values that are pure and
/// never used, iterated to a local fixed point per method.
#[derive(Default)]
pub struct DeadCodeElimination;

impl Named for DeadCodeElimination {
    fn name() -> &'static str {
        "dead-code-elimination"
    }

    fn description() -> &'static str {
        "Removes unreachable blocks and unused pure values"
    }
}

/// Count every use of a resolved value inside the live blocks, skipping
/// values already known dead. Uses come from body-value operands,
/// terminator arguments, and branch-target arguments.
fn count_uses(
    body: &MethodBody,
    live: &[BlockId],
    dead: &HashSet<ValueId>,
) -> HashMap<ValueId, usize> {
    fn record(
        body: &MethodBody,
        operands: &[warp_ir::ValueRef],
        uses: &mut HashMap<ValueId, usize>,
    ) {
        for operand in operands {
            *uses.entry(operand.resolve(body)).or_default() += 1;
        }
    }

    let mut uses: HashMap<ValueId, usize> = HashMap::new();
    for block in live {
        for value in body.block(*block).body() {
            let value = value.resolve(body);
            if dead.contains(&value) {
                continue;
            }
            record(body, body.value(value).operands(), &mut uses);
        }
        let terminator = body.resolve(body.block(*block).terminator());
        record(body, body.value(terminator).argument_refs(), &mut uses);
        for target in body.terminator_targets(*block) {
            record(body, body.value(target).operands(), &mut uses);
        }
    }
    uses
}

impl Visitor for DeadCodeElimination {
    fn start(&mut self, method: &mut Method, env: &IrEnv) -> VisResult {
        let scope = Scope::new(method, env)?;
        let live: Vec<BlockId> = scope.blocks().collect();
        let unreachable: Vec<BlockId> = method
            .body()
            .blocks()
            .filter(|(block, data)| {
                !data.is_removed() && !live.contains(block)
            })
            .map(|(block, _)| block)
            .collect();

        // find pure values that nothing uses, growing the dead set until
        // it stops changing
        let mut dead: HashSet<ValueId> = HashSet::new();
        loop {
            let uses = count_uses(method.body(), &live, &dead);
            let mut changed = false;
            for block in &live {
                for value in method.body().block(*block).body() {
                    let value = value.resolve(method.body());
                    if dead.contains(&value) {
                        continue;
                    }
                    let data = method.body().value(value);
                    if data.kind().has_side_effects() {
                        continue;
                    }
                    if uses.get(&value).copied().unwrap_or(0) == 0 {
                        dead.insert(value);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        if unreachable.is_empty() && dead.is_empty() {
            return Ok(Action::Continue);
        }

        let mut builder = MethodBuilder::new(method, env);
        for block in unreachable {
            builder.discard_block(block)?;
        }
        for block in &live {
            let scheduled: Vec<ValueId> = builder
                .method()
                .body()
                .block(*block)
                .body()
                .iter()
                .map(|value| value.direct())
                .filter(|value| {
                    dead.contains(&builder.method().body().resolve(*value))
                })
                .collect();
            let mut bb = builder.block(*block)?;
            for value in scheduled {
                bb.remove(value)?;
            }
        }
        builder.finish()?;
        Ok(Action::Continue)
    }
}
