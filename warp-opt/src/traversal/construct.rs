//! Pass construction: declared options and the visitor factory.
use super::Visitor;
use linked_hash_map::LinkedHashMap;
use warp_ir::Context;
use warp_utils::WarpResult;

/// A typed option value. The declared default fixes the type; a value
/// supplied by the driver must parse as the same variant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OptValue {
    Bool(bool),
    Num(i64),
}

impl OptValue {
    pub fn bool(self) -> bool {
        match self {
            OptValue::Bool(b) => b,
            OptValue::Num(_) => panic!("option holds a number, not a bool"),
        }
    }

    pub fn num(self) -> i64 {
        match self {
            OptValue::Num(n) => n,
            OptValue::Bool(_) => panic!("option holds a bool, not a number"),
        }
    }

    /// The numeric value when it is non-negative.
    pub fn pos_num(self) -> Option<u64> {
        u64::try_from(self.num()).ok()
    }

    /// Parse a value of the same shape as `self`.
    fn parse_same(self, raw: &str) -> Option<OptValue> {
        match self {
            OptValue::Bool(_) => match raw {
                "true" => Some(OptValue::Bool(true)),
                "false" => Some(OptValue::Bool(false)),
                _ => None,
            },
            OptValue::Num(_) => raw.parse().ok().map(OptValue::Num),
        }
    }
}

impl std::fmt::Display for OptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptValue::Bool(b) => write!(f, "{b}"),
            OptValue::Num(n) => write!(f, "{n}"),
        }
    }
}

/// An option a pass declares in [`Named::opts`].
pub struct PassOpt {
    name: &'static str,
    description: &'static str,
    default: OptValue,
}

impl PassOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: OptValue,
    ) -> Self {
        Self {
            name,
            description,
            default,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> OptValue {
        self.default
    }
}

/// Static identity of a pass: the registration name, a one-line
/// description, and the options it understands. Kept separate from
/// [`Visitor`] so the latter stays object-safe.
pub trait Named {
    fn name() -> &'static str;
    fn description() -> &'static str;
    fn opts() -> Vec<PassOpt> {
        vec![]
    }
}

/// The options of one pass after resolution against the driver's
/// `Context::extra_opts`.
pub struct ResolvedOpts {
    values: LinkedHashMap<&'static str, OptValue>,
}

impl ResolvedOpts {
    pub fn get(&self, name: &str) -> OptValue {
        match self.values.get(name) {
            Some(value) => *value,
            None => panic!("pass did not declare an option named `{name}'"),
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).bool()
    }

    pub fn num(&self, name: &str) -> i64 {
        self.get(name).num()
    }

    pub fn pos_num(&self, name: &str) -> Option<u64> {
        self.get(name).pos_num()
    }
}

/// Builds a pass instance out of the [`Context`], giving it a chance to
/// read its options before the first method is visited. Stateless passes
/// get this for free through the [Default] blanket impl below.
pub trait ConstructVisitor {
    /// Resolve this pass's declared options. Driver entries look like
    /// `pass:opt` (bare boolean flag) or `pass:opt=value`; entries
    /// addressed to other passes are ignored, unknown names and
    /// malformed values are logged and skipped.
    fn get_opts(ctx: &Context) -> ResolvedOpts
    where
        Self: Named,
    {
        let declared = Self::opts();
        let mut values: LinkedHashMap<&'static str, OptValue> = declared
            .iter()
            .map(|opt| (opt.name, opt.default))
            .collect();
        let pass = Self::name();
        for raw in &ctx.extra_opts {
            let Some(rest) = raw.strip_prefix(pass) else {
                continue;
            };
            let Some(rest) = rest.strip_prefix(':') else {
                continue;
            };
            let (name, value) = match rest.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (rest, None),
            };
            let Some(opt) = declared.iter().find(|o| o.name == name) else {
                log::warn!("unknown option `{name}' for pass `{pass}'");
                continue;
            };
            let resolved = match value {
                // a bare flag only makes sense for booleans
                None => match opt.default {
                    OptValue::Bool(_) => OptValue::Bool(true),
                    OptValue::Num(_) => {
                        log::warn!("option `{pass}:{name}' needs a value");
                        continue;
                    }
                },
                Some(raw_value) => match opt.default.parse_same(raw_value) {
                    Some(parsed) => parsed,
                    None => {
                        log::warn!(
                            "ignoring malformed value `{raw_value}' for `{pass}:{name}'"
                        );
                        continue;
                    }
                },
            };
            log::debug!("{pass}: {name} -> {resolved}");
            values.insert(opt.name, resolved);
        }
        ResolvedOpts { values }
    }

    /// Build the pass from the context.
    fn from(ctx: &Context) -> WarpResult<Self>
    where
        Self: Sized;

    /// Reset per-method state; invoked between methods by
    /// [Visitor::do_pass].
    fn clear_data(&mut self);
}

impl<T: Default + Sized + Visitor> ConstructVisitor for T {
    fn from(_ctx: &Context) -> WarpResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::{Action, VisResult};
    use warp_ir::{IrEnv, Method};

    struct Probe;

    impl Named for Probe {
        fn name() -> &'static str {
            "probe"
        }

        fn description() -> &'static str {
            "exercises option resolution"
        }

        fn opts() -> Vec<PassOpt> {
            vec![
                PassOpt::new("limit", "a number", OptValue::Num(4)),
                PassOpt::new("trace", "a flag", OptValue::Bool(false)),
            ]
        }
    }

    impl Visitor for Probe {
        fn start(&mut self, _: &mut Method, _: &IrEnv) -> VisResult {
            Ok(Action::Continue)
        }
    }

    impl ConstructVisitor for Probe {
        fn from(_: &Context) -> WarpResult<Self> {
            Ok(Probe)
        }

        fn clear_data(&mut self) {}
    }

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let ctx = Context::new();
        let opts = Probe::get_opts(&ctx);
        assert_eq!(opts.num("limit"), 4);
        assert!(!opts.bool("trace"));
    }

    #[test]
    fn driver_entries_override_defaults() {
        let mut ctx = Context::new();
        ctx.extra_opts.push("probe:limit=9".into());
        ctx.extra_opts.push("probe:trace".into());
        ctx.extra_opts.push("other:limit=1".into());
        let opts = Probe::get_opts(&ctx);
        assert_eq!(opts.num("limit"), 9);
        assert!(opts.bool("trace"));
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let mut ctx = Context::new();
        ctx.extra_opts.push("probe:limit=loud".into());
        ctx.extra_opts.push("probe:unknown=1".into());
        let opts = Probe::get_opts(&ctx);
        assert_eq!(opts.num("limit"), 4);
        assert_eq!(opts.pos_num("limit"), Some(4));
    }
}
