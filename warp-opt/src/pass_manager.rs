//! Registration and execution of compiler passes.
use crate::traversal;
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use std::time::Instant;
use warp_ir::{Context, Printer};
use warp_utils::{Error, MultiError, WarpResult};

pub type PassResult<T> = std::result::Result<T, MultiError>;

/// Top-level type for all passes that transform a [`Context`].
pub type PassClosure = Box<dyn Fn(&mut Context) -> PassResult<()>>;

/// One registered pass: its runner plus the metadata rendered as help
/// text.
struct Registration {
    runner: PassClosure,
    description: &'static str,
    opts: Vec<traversal::PassOpt>,
}

/// Tracks every registered pass and alias. Registration order is kept
/// and drives both help output and alias expansion.
#[derive(Default)]
pub struct PassManager {
    passes: LinkedHashMap<String, Registration>,
    aliases: LinkedHashMap<String, Vec<String>>,
}

impl PassManager {
    /// Register a pass under its [`Named::name`](traversal::Named::name).
    /// Registering a name twice is an error.
    pub fn register_pass<Pass>(&mut self) -> WarpResult<()>
    where
        Pass: traversal::Visitor
            + traversal::ConstructVisitor
            + traversal::Named,
    {
        let name = Pass::name();
        if self.is_taken(name) {
            return Err(Error::misc(format!(
                "`{name}' is already registered"
            )));
        }
        let registration = Registration {
            runner: Box::new(|ctx| {
                Pass::do_pass_default(ctx)?;
                Ok(())
            }),
            description: Pass::description(),
            opts: Pass::opts(),
        };
        self.passes.insert(name.to_string(), registration);
        Ok(())
    }

    /// Define an alias for a pipeline of passes or other aliases.
    /// Aliases expand eagerly, so an alias may only mention names
    /// registered before it.
    pub fn add_alias(
        &mut self,
        name: &str,
        pipeline: &[&str],
    ) -> WarpResult<()> {
        if self.is_taken(name) {
            return Err(Error::misc(format!(
                "`{name}' is already registered"
            )));
        }
        let mut expanded = Vec::new();
        for entry in pipeline {
            self.expand_into(entry, &mut expanded)?;
        }
        self.aliases.insert(name.to_string(), expanded);
        Ok(())
    }

    fn is_taken(&self, name: &str) -> bool {
        self.passes.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Append the expansion of `name`, a pass or an alias, to `out`.
    fn expand_into(
        &self,
        name: &str,
        out: &mut Vec<String>,
    ) -> WarpResult<()> {
        if self.passes.contains_key(name) {
            out.push(name.to_string());
        } else if let Some(pipeline) = self.aliases.get(name) {
            out.extend(pipeline.iter().cloned());
        } else {
            return Err(Error::misc(format!(
                "unknown pass or alias `{name}'; registered passes: {}",
                self.passes.keys().join(", ")
            )));
        }
        Ok(())
    }

    fn render_pass(name: &str, registration: &Registration) -> String {
        let mut text = format!("{name}: {}", registration.description);
        for opt in &registration.opts {
            text.push_str(&format!(
                "\n    {}={} {}",
                opt.name(),
                opt.default(),
                opt.description()
            ));
        }
        text
    }

    fn render_alias(name: &str, pipeline: &[String]) -> String {
        format!("{name}: alias for {}", pipeline.iter().join(" -> "))
    }

    /// Help text for one pass or alias, if it exists.
    pub fn specific_help(&self, name: &str) -> Option<String> {
        if let Some(registration) = self.passes.get(name) {
            return Some(Self::render_pass(name, registration));
        }
        self.aliases
            .get(name)
            .map(|pipeline| Self::render_alias(name, pipeline))
    }

    /// Help text for every pass and alias, in registration order.
    pub fn complete_help(&self) -> String {
        let passes = self
            .passes
            .iter()
            .map(|(name, registration)| Self::render_pass(name, registration))
            .join("\n");
        let aliases = self
            .aliases
            .iter()
            .map(|(name, pipeline)| Self::render_alias(name, pipeline))
            .join("\n");
        format!("Passes:\n{passes}\n\nAliases:\n{aliases}\n")
    }

    /// Expand, validate, and run a plan. Entries of `excl` are expanded
    /// the same way and skipped; with `dump_ir` every method is printed
    /// after each pass.
    pub fn execute_plan(
        &self,
        ctx: &mut Context,
        incl: &[String],
        excl: &[String],
        dump_ir: bool,
    ) -> PassResult<()> {
        let mut plan = Vec::new();
        for entry in incl {
            self.expand_into(entry, &mut plan)?;
        }
        let mut skip = Vec::new();
        for entry in excl {
            self.expand_into(entry, &mut skip)?;
        }

        for name in plan {
            if skip.contains(&name) {
                log::info!("{name}: skipped");
                continue;
            }
            let started = Instant::now();
            (self.passes[&name].runner)(ctx)?;
            let millis = started.elapsed().as_millis();
            if millis > 5000 {
                log::warn!("{name}: took {millis}ms");
            } else {
                log::info!("{name}: {millis}ms");
            }
            if dump_ir {
                for method in ctx.methods() {
                    Printer::write_method(
                        method,
                        ctx.env(),
                        &mut std::io::stdout(),
                    )
                    .map_err(|err| MultiError::from(Error::from(err)))?;
                }
            }
        }
        Ok(())
    }
}

/// Register an alias with a pass manager, naming passes by type or by
/// string.
///
/// ## Example
/// ```ignore
/// register_alias!(pm, "opt", [IfConversion, DeadCodeElimination]);
/// ```
#[macro_export]
macro_rules! register_alias {
    (@name $pass:ident) => {
        $pass::name()
    };

    (@name $pass:literal) => {
        $pass
    };

    ($manager:expr, $alias:literal, [ $($pass:tt),* $(,)? ]) => {
        $manager.add_alias($alias, &[$(register_alias!(@name $pass)),*])?;
    };
}
