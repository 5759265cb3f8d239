//! Textual formatter for methods and values. This surface exists for
//! debugging and test goldens; it is not stable.
use crate::common::{BlockId, ValueId, ValueRef};
use crate::context::IrEnv;
use crate::method::{Method, MethodBody};
use crate::value::ValueKind;
use itertools::Itertools;
use std::io;
use warp_utils::GetName;

/// Printer for the IR. Printing never mutates the method.
pub struct Printer;

impl Printer {
    /// Render `<type> <reference>` for a value, e.g. `i32 %4`.
    pub fn format_value_ref(
        method: &Method,
        env: &IrEnv,
        value: ValueId,
    ) -> String {
        let body = method.body();
        let data = body.value(body.resolve(value));
        format!("{} {}", env.types().format(data.ty()), data.id())
    }

    /// Render an operand: constants inline, anything else by node id.
    fn format_operand(body: &MethodBody, value: ValueRef) -> String {
        let data = body.value(value.resolve(body));
        match data.kind() {
            ValueKind::Primitive { raw } => format!("{raw}"),
            ValueKind::Null => "null".to_string(),
            _ => data.id().to_string(),
        }
    }

    fn format_target(body: &MethodBody, target: ValueId) -> String {
        let data = body.value(target);
        let dest = match data.destination() {
            Some(dest) => format!("^{}", body.block(dest).name()),
            None => "^?".to_string(),
        };
        if data.operands().is_empty() {
            dest
        } else {
            format!(
                "{dest}({})",
                data.operands()
                    .iter()
                    .map(|argument| Self::format_operand(body, *argument))
                    .join(", ")
            )
        }
    }

    fn format_terminator(body: &MethodBody, terminator: ValueId) -> String {
        let data = body.value(body.resolve(terminator));
        let targets = data
            .target_refs()
            .iter()
            .map(|target| {
                Self::format_target(body, target.resolve(body))
            })
            .collect_vec();
        match data.kind() {
            ValueKind::Return => {
                let argument = data.argument_refs()[0];
                match body.value(argument.resolve(body)).kind() {
                    ValueKind::Null => "ret".to_string(),
                    _ => format!(
                        "ret {}",
                        Self::format_operand(body, argument)
                    ),
                }
            }
            ValueKind::UnconditionalBranch => {
                format!("branch {}", targets[0])
            }
            ValueKind::ConditionalBranch => {
                let condition =
                    Self::format_operand(body, data.argument_refs()[0]);
                format!("branch {condition}, {}, {}", targets[0], targets[1])
            }
            ValueKind::SwitchBranch => {
                let selector =
                    Self::format_operand(body, data.argument_refs()[0]);
                format!("switch {selector}, [{}]", targets.join(", "))
            }
            ValueKind::BuilderTerminator => "builder".to_string(),
            _ => "?".to_string(),
        }
    }

    fn mnemonic(kind: &ValueKind) -> String {
        match kind {
            ValueKind::Unary { op } => format!("unary.{op}"),
            ValueKind::Binary { op } => format!("binary.{op}"),
            ValueKind::Compare { op } => format!("cmp.{op}"),
            ValueKind::Call { callee } => format!("call @{callee}"),
            other => other.prefix().to_string(),
        }
    }

    fn write_block<W: io::Write>(
        method: &Method,
        env: &IrEnv,
        block: BlockId,
        out: &mut W,
    ) -> io::Result<()> {
        let body = method.body();
        let data = body.block(block);
        let params = data
            .params()
            .iter()
            .map(|param| {
                let param_data = body.value(param);
                format!(
                    "{}: {}",
                    param_data.id(),
                    env.types().format(param_data.ty())
                )
            })
            .join(", ");
        if params.is_empty() {
            writeln!(out, "  ^{}:", data.name())?;
        } else {
            writeln!(out, "  ^{}({params}):", data.name())?;
        }
        for value in data.body() {
            let value_data = body.value(value.resolve(body));
            writeln!(
                out,
                "    {}: {} = {} {}",
                value_data.id(),
                env.types().format(value_data.ty()),
                Self::mnemonic(value_data.kind()),
                value_data
                    .operands()
                    .iter()
                    .map(|operand| Self::format_operand(body, *operand))
                    .join(", ")
            )?;
        }
        writeln!(
            out,
            "    {}",
            Self::format_terminator(body, data.terminator())
        )
    }

    /// Print a method: signature, then every live block in arena order.
    pub fn write_method<W: io::Write>(
        method: &Method,
        env: &IrEnv,
        out: &mut W,
    ) -> io::Result<()> {
        let body = method.body();
        let params = method
            .params()
            .iter()
            .map(|param| {
                let data = body.value(param);
                format!("{}: {}", data.id(), env.types().format(data.ty()))
            })
            .join(", ");
        writeln!(
            out,
            "method @{}({params}) -> {} {{",
            method.name(),
            env.types().format(method.return_type())
        )?;
        for (block, data) in body.blocks() {
            if data.is_removed() {
                continue;
            }
            Self::write_block(method, env, block, out)?;
        }
        writeln!(out, "}}")
    }

    pub fn method_to_string(method: &Method, env: &IrEnv) -> String {
        let mut buf = Vec::new();
        Self::write_method(method, env, &mut buf)
            .expect("writing to a Vec cannot fail");
        String::from_utf8(buf).expect("printer emits utf-8")
    }
}
