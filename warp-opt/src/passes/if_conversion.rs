//! Replaces control-flow diamonds with straight-line predicate selects.
use crate::analysis::{ControlFlowGraph, Dominators, IfInfo, IfInfos, Variable};
use crate::traversal::{
    Action, ConstructVisitor, Named, OptValue, PassOpt, VisResult, Visitor,
};
use warp_ir::{
    Context, IrEnv, Method, MethodBody, MethodBuilder, Scope, ValueKind,
};
use warp_utils::{Error, WarpResult};

/// Rewrites simple if diamonds into a single block: the branch bodies are
/// merged into the entry and every exit parameter becomes a
/// `select(condition, true_value, false_value)`.
///
/// # Example
/// ```text
/// entry: branch %c, ^then, ^else     entry: %t = binary.add ...
/// then:  %t = ...; branch ^exit(%t)         %e = binary.sub ...
/// else:  %e = ...; branch ^exit(%e)   =>    %p = pred %c, %t, %e
/// exit(%p): ret %p                          ret %p
/// ```
#[derive(Debug)]
pub struct IfConversion {
    max_block_size: u64,
    max_size_difference: u64,
}

impl Named for IfConversion {
    fn name() -> &'static str {
        "if-conversion"
    }

    fn description() -> &'static str {
        "Converts simple if diamonds into predicated straight-line code"
    }

    fn opts() -> Vec<PassOpt> {
        vec![
            PassOpt::new(
                "max-block-size",
                "Maximum number of instructions per branch block",
                OptValue::Num(2),
            ),
            PassOpt::new(
                "max-size-difference",
                "Maximum size difference between the two branch blocks",
                OptValue::Num(1),
            ),
        ]
    }
}

impl ConstructVisitor for IfConversion {
    fn from(ctx: &Context) -> WarpResult<Self> {
        let opts = Self::get_opts(ctx);
        let max_block_size = opts
            .pos_num("max-block-size")
            .filter(|size| *size >= 1)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "max-block-size must be at least 1",
                )
            })?;
        let max_size_difference = opts
            .pos_num("max-size-difference")
            .filter(|difference| *difference >= 1)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "max-size-difference must be at least 1",
                )
            })?;
        Ok(IfConversion {
            max_block_size,
            max_size_difference,
        })
    }

    fn clear_data(&mut self) {}
}

/// True while the snapshot candidate still matches the graph; earlier
/// conversions in the same sweep can consume a candidate's blocks.
fn still_applies(body: &MethodBody, info: &IfInfo) -> bool {
    let blocks =
        [info.entry, info.if_block, info.else_block, info.exit_block];
    if blocks.iter().any(|block| body.block(*block).is_removed()) {
        return false;
    }
    let terminator = body.block(info.entry).terminator();
    let terminator = body.value(body.resolve(terminator));
    if !matches!(terminator.kind(), ValueKind::ConditionalBranch) {
        return false;
    }
    let true_dest = body
        .value(terminator.target_refs()[0].resolve(body))
        .destination();
    let false_dest = body
        .value(terminator.target_refs()[1].resolve(body))
        .destination();
    true_dest == Some(info.if_block) && false_dest == Some(info.else_block)
}

impl IfConversion {
    fn candidate(
        &self,
        body: &MethodBody,
        cfg: &ControlFlowGraph,
        info: &IfInfo,
    ) -> WarpResult<Option<Vec<Variable>>> {
        if !info.is_simple(body, cfg) {
            return Ok(None);
        }
        let if_size = body.block(info.if_block).body().len() as u64;
        let else_size = body.block(info.else_block).body().len() as u64;
        if if_size > self.max_block_size || else_size > self.max_block_size {
            return Ok(None);
        }
        if if_size.abs_diff(else_size) > self.max_size_difference {
            return Ok(None);
        }
        if body.block_has_side_effects(info.if_block)
            || body.block_has_side_effects(info.else_block)
        {
            return Ok(None);
        }
        info.variables(body).map(Some)
    }

    fn convert(
        builder: &mut MethodBuilder,
        info: &IfInfo,
        variables: &[Variable],
    ) -> WarpResult<()> {
        let mut replacements = Vec::with_capacity(variables.len());
        {
            let mut bb = builder.block(info.entry)?;
            bb.merge_block(info.if_block, false)?;
            bb.merge_block(info.else_block, false)?;
            for variable in variables {
                let predicate = bb.create_predicate(
                    info.condition,
                    variable.true_value,
                    variable.false_value,
                )?;
                replacements.push((variable.param, predicate));
            }
        }
        for (param, predicate) in replacements {
            builder.replace(param, predicate)?;
        }
        builder.block(info.entry)?.merge_block(info.exit_block, false)?;
        Ok(())
    }
}

impl Visitor for IfConversion {
    fn start(&mut self, method: &mut Method, env: &IrEnv) -> VisResult {
        // snapshot the candidates before touching the graph
        let candidates = {
            let scope = Scope::new(method, env)?;
            let cfg = ControlFlowGraph::new(&scope);
            let dominators = Dominators::new(&cfg);
            let infos = IfInfos::new(&scope, &cfg, &dominators);
            let body = method.body();
            let mut candidates = Vec::new();
            for info in infos.iter() {
                if let Some(variables) = self.candidate(body, &cfg, info)? {
                    candidates.push((*info, variables));
                }
            }
            candidates
        };
        if candidates.is_empty() {
            return Ok(Action::Continue);
        }

        let mut builder = MethodBuilder::new(method, env);
        for (info, variables) in &candidates {
            if !still_applies(builder.method().body(), info) {
                continue;
            }
            Self::convert(&mut builder, info, variables)?;
        }
        builder.finish()?;
        Ok(Action::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_ir::{
        BasicValueType, BinaryOp, GetName, Id, Printer, ValueId,
    };

    /// entry branches on `c` to two one-instruction arms that join at an
    /// exit taking one parameter; the exit returns it.
    fn build_diamond(ctx: &mut Context, side_effect: bool) {
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        let i1 = ctx.env().types().primitive(BasicValueType::Int1);
        ctx.declare(
            "f",
            i32_ty,
            &[(Id::new("x"), i32_ty), (Id::new("c"), i1)],
        )
        .unwrap();

        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let c = method.params().get(1).unwrap();
        let mut mb = MethodBuilder::new(method, env);
        let then_block = mb.create_block("then");
        let else_block = mb.create_block("else");
        let exit = mb.create_block("exit");
        let p = mb.create_block_parameter(exit, i32_ty, Id::new("p"));
        let entry = mb.entry_block();
        mb.block(entry)
            .unwrap()
            .create_conditional_branch(c, then_block, else_block)
            .unwrap();
        {
            let mut bb = mb.block(then_block).unwrap();
            let value = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            if side_effect {
                bb.create_store(x, value).unwrap();
            }
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, value).unwrap();
        }
        {
            let mut bb = mb.block(else_block).unwrap();
            let value = bb.create_binary(BinaryOp::Sub, x, x).unwrap();
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, value).unwrap();
        }
        mb.block(exit).unwrap().create_return(Some(p)).unwrap();
        mb.finish().unwrap();
    }

    fn live_blocks(ctx: &Context) -> usize {
        ctx.find_method("f").unwrap().num_live_blocks()
    }

    #[test]
    fn converts_a_simple_diamond() {
        let mut ctx = Context::new();
        build_diamond(&mut ctx, false);
        assert_eq!(live_blocks(&ctx), 4);

        IfConversion::do_pass_default(&mut ctx).unwrap();

        assert_eq!(live_blocks(&ctx), 1);
        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let entry = method.entry_block();
        let terminator = body.block(entry).terminator();
        assert!(matches!(
            body.value(body.resolve(terminator)).kind(),
            ValueKind::Return
        ));
        let returned = body.return_value(terminator).unwrap();
        let returned = body.value(returned);
        assert!(matches!(returned.kind(), ValueKind::Predicate));

        let operands: Vec<ValueId> = returned
            .operands()
            .iter()
            .map(|operand| operand.resolve(body))
            .collect();
        assert!(matches!(
            body.value(operands[1]).kind(),
            ValueKind::Binary { op: BinaryOp::Add }
        ));
        assert!(matches!(
            body.value(operands[2]).kind(),
            ValueKind::Binary { op: BinaryOp::Sub }
        ));

        let printed = Printer::method_to_string(method, ctx.env());
        assert!(printed.contains("pred"));
    }

    #[test]
    fn skips_diamonds_with_side_effects() {
        let mut ctx = Context::new();
        build_diamond(&mut ctx, true);

        IfConversion::do_pass_default(&mut ctx).unwrap();

        assert_eq!(live_blocks(&ctx), 4);
        let method = ctx.find_method("f").unwrap();
        let body = method.body();
        let terminator = body.block(method.entry_block()).terminator();
        assert!(matches!(
            body.value(body.resolve(terminator)).kind(),
            ValueKind::ConditionalBranch
        ));
    }

    #[test]
    fn skips_oversized_branches() {
        let mut ctx = Context::new();
        ctx.extra_opts.push("if-conversion:max-block-size=1".into());
        build_diamond(&mut ctx, false);

        // both arms hold one instruction; shrink the budget and widen one
        // arm past it
        let (env, method) = ctx.method_with_env("f").unwrap();
        let x = method.params().get(0).unwrap();
        let then_block = method
            .body()
            .blocks()
            .find(|(_, data)| data.name() == Id::new("then"))
            .map(|(block, _)| block)
            .unwrap();
        let mut mb = MethodBuilder::new(method, env);
        {
            let mut bb = mb.block(then_block).unwrap();
            bb.move_to_start();
            bb.create_binary(BinaryOp::Mul, x, x).unwrap();
        }
        mb.finish().unwrap();

        IfConversion::do_pass_default(&mut ctx).unwrap();
        assert_eq!(live_blocks(&ctx), 4);
    }

    #[test]
    fn rejects_out_of_range_options() {
        let mut ctx = Context::new();
        ctx.extra_opts.push("if-conversion:max-block-size=0".into());
        let err =
            <IfConversion as ConstructVisitor>::from(&ctx)
                .unwrap_err();
        assert!(err.is_invalid_argument());

        let mut ctx = Context::new();
        ctx.extra_opts
            .push("if-conversion:max-size-difference=-3".into());
        let err =
            <IfConversion as ConstructVisitor>::from(&ctx)
                .unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
