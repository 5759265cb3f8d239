//! Recognition of high-level `if` patterns in the control-flow graph.
use super::{ControlFlowGraph, Dominators};
use warp_ir::{BlockId, MethodBody, Scope, ValueId, ValueKind};
use warp_utils::{Error, WarpResult};

/// One joined value of an if pattern: the exit-block parameter together
/// with the values supplied on the true and false edges.
#[derive(Debug, Clone, Copy)]
pub struct Variable {
    pub param: ValueId,
    pub true_value: ValueId,
    pub false_value: ValueId,
}

/// A recognised if pattern: `entry` ends in a conditional branch whose
/// arms eventually join at `exit_block`.
#[derive(Debug, Clone, Copy)]
pub struct IfInfo {
    pub condition: ValueId,
    pub entry: BlockId,
    pub if_block: BlockId,
    pub else_block: BlockId,
    pub exit_block: BlockId,
}

impl IfInfo {
    /// A simple if is a proper diamond: four distinct blocks, the branch
    /// arms carry no parameters of their own, and each arm's only
    /// successor is the exit.
    pub fn is_simple(&self, body: &MethodBody, cfg: &ControlFlowGraph) -> bool {
        let distinct = self.if_block != self.else_block
            && self.if_block != self.exit_block
            && self.else_block != self.exit_block
            && self.entry != self.exit_block
            && self.entry != self.if_block
            && self.entry != self.else_block;
        if !distinct {
            return false;
        }
        if !body.block(self.if_block).params().is_empty()
            || !body.block(self.else_block).params().is_empty()
        {
            return false;
        }
        let if_successors = cfg.successors(self.if_block);
        let else_successors = cfg.successors(self.else_block);
        if_successors == [self.exit_block]
            && else_successors == [self.exit_block]
    }

    /// Pair the exit block's parameters positionally with the branch
    /// arguments supplied by the two arms.
    pub fn variables(&self, body: &MethodBody) -> WarpResult<Vec<Variable>> {
        let true_target =
            body.target_to(self.if_block, self.exit_block).ok_or_else(
                || Error::internal("if arm does not reach the exit"),
            )?;
        let false_target =
            body.target_to(self.else_block, self.exit_block).ok_or_else(
                || Error::internal("else arm does not reach the exit"),
            )?;
        let true_args = body.value(true_target).operands();
        let false_args = body.value(false_target).operands();
        let params = body.block(self.exit_block).params();
        if true_args.len() != params.len()
            || false_args.len() != params.len()
        {
            return Err(Error::internal(
                "branch arguments do not match the exit parameters",
            ));
        }
        Ok(params
            .iter()
            .enumerate()
            .map(|(index, param)| Variable {
                param,
                true_value: true_args[index].resolve(body),
                false_value: false_args[index].resolve(body),
            })
            .collect())
    }
}

/// Every if pattern of a scope, recognised by sweeping the blocks with
/// exactly two predecessors.
pub struct IfInfos {
    infos: Vec<IfInfo>,
}

impl IfInfos {
    pub fn new(
        scope: &Scope,
        cfg: &ControlFlowGraph,
        dominators: &Dominators,
    ) -> Self {
        let body = scope.method().body();
        let mut infos = Vec::new();
        for exit in scope.blocks() {
            let predecessors = cfg.predecessors(exit);
            if predecessors.len() != 2 {
                continue;
            }
            let Some(header) = dominators
                .common_dominator(predecessors[0], predecessors[1])
            else {
                continue;
            };
            if cfg.num_successors(header) != 2 {
                continue;
            }
            let terminator = body.block(header).terminator();
            let terminator =
                body.value(body.resolve(terminator));
            if !matches!(terminator.kind(), ValueKind::ConditionalBranch) {
                continue;
            }
            let condition = terminator.argument_refs()[0].resolve(body);
            let true_dest = body
                .value(terminator.target_refs()[0].resolve(body))
                .destination();
            let false_dest = body
                .value(terminator.target_refs()[1].resolve(body))
                .destination();
            let (Some(if_block), Some(else_block)) = (true_dest, false_dest)
            else {
                continue;
            };
            infos.push(IfInfo {
                condition,
                entry: header,
                if_block,
                else_block,
                exit_block: exit,
            });
        }
        Self { infos }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IfInfo> {
        self.infos.iter()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_ir::{
        BasicValueType, BinaryOp, Context, Id, MethodBuilder,
    };

    fn build_diamond(ctx: &mut Context) {
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
            let v = bb.create_binary(BinaryOp::Add, x, x).unwrap();
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, v).unwrap();
        }
        {
            let mut bb = mb.block(else_block).unwrap();
            let v = bb.create_binary(BinaryOp::Sub, x, x).unwrap();
            bb.create_branch(exit).unwrap();
            bb.add_branch_argument(exit, v).unwrap();
        }
        mb.block(exit).unwrap().create_return(Some(p)).unwrap();
        mb.finish().unwrap();
    }

    #[test]
    fn recognises_a_diamond() {
        let mut ctx = Context::new();
        build_diamond(&mut ctx);
        let method = ctx.find_method("f").unwrap();
        let scope = warp_ir::Scope::new(method, ctx.env()).unwrap();
        let cfg = ControlFlowGraph::new(&scope);
        let dominators = Dominators::new(&cfg);
        let infos = IfInfos::new(&scope, &cfg, &dominators);

        assert_eq!(infos.len(), 1);
        let info = infos.iter().next().unwrap();
        assert_eq!(info.entry, method.entry_block());
        assert!(info.is_simple(method.body(), &cfg));

        let variables = info.variables(method.body()).unwrap();
        assert_eq!(variables.len(), 1);
        let body = method.body();
        assert!(matches!(
            body.value(variables[0].true_value).kind(),
            warp_ir::ValueKind::Binary { op: BinaryOp::Add }
        ));
        assert!(matches!(
            body.value(variables[0].false_value).kind(),
            warp_ir::ValueKind::Binary { op: BinaryOp::Sub }
        ));
    }

    #[test]
    fn dominator_queries_on_the_diamond() {
        let mut ctx = Context::new();
        build_diamond(&mut ctx);
        let method = ctx.find_method("f").unwrap();
        let scope = warp_ir::Scope::new(method, ctx.env()).unwrap();
        let cfg = ControlFlowGraph::new(&scope);
        let dominators = Dominators::new(&cfg);

        let entry = method.entry_block();
        let body = method.body();
        let arms = body.successors(entry);
        assert_eq!(arms.len(), 2);
        let exit = body.successors(arms[0])[0];

        assert_eq!(dominators.immediate_dominator(entry), None);
        assert_eq!(dominators.immediate_dominator(exit), Some(entry));
        assert!(dominators.dominates(entry, exit));
        assert!(!dominators.dominates(arms[0], exit));
        assert_eq!(
            dominators.common_dominator(arms[0], arms[1]),
            Some(entry)
        );
        assert_eq!(dominators.common_dominator(exit, exit), Some(exit));
    }
}
