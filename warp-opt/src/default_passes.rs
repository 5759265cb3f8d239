//! Defines the default passes available to the pass manager.
use crate::passes::{DeadCodeElimination, IfConversion};
use crate::register_alias;
use crate::traversal::Named;
use crate::{PassManager, PassResult};

impl PassManager {
    pub fn default_passes() -> PassResult<Self> {
        let mut pm = PassManager::default();

        pm.register_pass::<IfConversion>()?;
        pm.register_pass::<DeadCodeElimination>()?;

        register_alias!(pm, "opt", [IfConversion, DeadCodeElimination]);
        register_alias!(pm, "none", []);

        Ok(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_ir::{BasicValueType, Context, Id, MethodBuilder, ValueKind};

    #[test]
    fn registers_and_runs_the_default_pipeline() {
        let pm = PassManager::default_passes().unwrap();
        assert!(pm.specific_help("if-conversion").is_some());
        assert!(pm.specific_help("opt").is_some());

        let mut ctx = Context::new();
        let i32_ty = ctx.env().types().primitive(BasicValueType::Int32);
        let i1 = ctx.env().types().primitive(BasicValueType::Int1);
        ctx.declare(
            "f",
            i32_ty,
            &[(Id::new("x"), i32_ty), (Id::new("c"), i1)],
        )
        .unwrap();
        {
            let (env, method) = ctx.method_with_env("f").unwrap();
            let x = method.params().get(0).unwrap();
            let c = method.params().get(1).unwrap();
            let mut mb = MethodBuilder::new(method, env);
            let then_block = mb.create_block("then");
            let else_block = mb.create_block("else");
            let exit = mb.create_block("exit");
            let p =
                mb.create_block_parameter(exit, i32_ty, Id::new("p"));
            let entry = mb.entry_block();
            mb.block(entry)
                .unwrap()
                .create_conditional_branch(c, then_block, else_block)
                .unwrap();
            {
                let mut bb = mb.block(then_block).unwrap();
                let v = bb
                    .create_binary(warp_ir::BinaryOp::Add, x, x)
                    .unwrap();
                bb.create_branch(exit).unwrap();
                bb.add_branch_argument(exit, v).unwrap();
            }
            {
                let mut bb = mb.block(else_block).unwrap();
                let v = bb
                    .create_binary(warp_ir::BinaryOp::Sub, x, x)
                    .unwrap();
                bb.create_branch(exit).unwrap();
                bb.add_branch_argument(exit, v).unwrap();
            }
            mb.block(exit).unwrap().create_return(Some(p)).unwrap();
            mb.finish().unwrap();
        }

        pm.execute_plan(&mut ctx, &["opt".to_string()], &[], false)
            .unwrap();

        let method = ctx.find_method("f").unwrap();
        assert_eq!(method.num_live_blocks(), 1);
        let body = method.body();
        let terminator = body.block(method.entry_block()).terminator();
        assert!(matches!(
            body.value(body.resolve(terminator)).kind(),
            ValueKind::Return
        ));
    }

    #[test]
    fn unknown_passes_are_rejected() {
        let pm = PassManager::default_passes().unwrap();
        let mut ctx = Context::new();
        let err = pm.execute_plan(
            &mut ctx,
            &["no-such-pass".to_string()],
            &[],
            false,
        );
        assert!(err.is_err());
    }
}
