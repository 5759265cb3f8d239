//! Implements the visitor driven over every method of a [`Context`].
use super::action::Action;
use super::{ConstructVisitor, MethodTraversal, Named, Order, VisResult};
use warp_ir::{Context, IrEnv, Method};
use warp_utils::WarpResult;

/// The visiting interface for a program. A pass overrides
/// [`Visitor::start`] (and possibly [`Visitor::finish`]) and is driven
/// over every method by [`Visitor::do_pass`].
pub trait Visitor {
    /// When this returns a reason string the whole pass is skipped and
    /// the reason is logged; `None` lets it run.
    fn precondition(_ctx: &Context) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// The order methods are visited in.
    #[inline(always)]
    fn iteration_order() -> Order
    where
        Self: Sized,
    {
        Order::No
    }

    /// Called with each method of the program.
    fn start(&mut self, _method: &mut Method, _env: &IrEnv) -> VisResult {
        Ok(Action::Continue)
    }

    /// Called after [`Visitor::start`] on each method.
    fn finish(&mut self, _method: &mut Method, _env: &IrEnv) -> VisResult {
        Ok(Action::Continue)
    }

    /// Run the visitor over one method.
    fn traverse_method(
        &mut self,
        method: &mut Method,
        env: &IrEnv,
    ) -> WarpResult<()>
    where
        Self: Sized,
    {
        match self.start(method, env)? {
            Action::Stop => Ok(()),
            Action::Continue => {
                self.finish(method, env)?;
                Ok(())
            }
        }
    }

    /// Run the visitor over every method of the program.
    fn do_pass(&mut self, ctx: &mut Context) -> WarpResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(reason) = Self::precondition(ctx) {
            log::info!(target: Self::name(), "skipping pass: {reason}");
            return Ok(());
        }
        let traversal = MethodTraversal::new(ctx, Self::iteration_order());
        let names: Vec<_> = traversal.names().collect();
        for name in names {
            let (env, method) = ctx.method_with_env(name)?;
            self.traverse_method(method, env)?;
            self.clear_data();
        }
        Ok(())
    }

    /// Construct the pass from the context and run it.
    fn do_pass_default(ctx: &mut Context) -> WarpResult<Self>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        let mut visitor = Self::from(ctx)?;
        visitor.do_pass(ctx)?;
        Ok(visitor)
    }
}
