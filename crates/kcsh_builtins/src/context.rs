//! `context` builtin command - inspect and switch the active context
//!
//! ```text
//! context              print the active context
//! context list         list all contexts
//! context select       list, then switch by number
//! context <name>       switch by exact name or first name containing it
//! ```
//!
//! The catalog and the active context are re-read from the client on every
//! invocation.

use std::io::Write;

use kcsh_core::error::{ClientErrorKind, ErrorKind, ShellError, UserInputErrorKind};
use kcsh_core::ContextCatalog;
use kcsh_ui::{Prompt, ReadOutcome};

use crate::common::{BuiltinContext, BuiltinResult, Flow};
use crate::Builtin;

pub struct ContextCommand;

impl Builtin for ContextCommand {
    fn name(&self) -> &'static str {
        "context"
    }

    fn synopsis(&self) -> &'static str {
        "Show, list or switch the active context"
    }

    fn usage(&self) -> &'static str {
        "context [list | select | NAME-OR-FRAGMENT]"
    }

    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult {
        match args {
            [] => show_active(ctx),
            [sub] if sub.eq_ignore_ascii_case("list") => list(ctx),
            [sub] if sub.eq_ignore_ascii_case("select") => select(ctx),
            [query] => switch_matching(ctx, query),
            _ => Err(ShellError::user_input(
                UserInputErrorKind::TooManyArguments,
                format!("too many arguments\nusage: {}", self.usage()),
            )
            .into()),
        }
    }
}

fn show_active(ctx: &mut BuiltinContext<'_>) -> BuiltinResult {
    let active = ctx.switch.refresh()?;
    ctx.prompt.set_active_context(active.clone());
    writeln!(ctx.out, "{active}")?;
    Ok(Flow::Continue(0))
}

fn load_catalog(ctx: &BuiltinContext<'_>) -> anyhow::Result<ContextCatalog> {
    Ok(ctx.switch.client().catalog()?)
}

/// The marker follows the client, not the prompt; an unset context marks nothing
fn print_catalog(ctx: &mut BuiltinContext<'_>, catalog: &ContextCatalog) -> anyhow::Result<()> {
    let active = match ctx.switch.refresh() {
        Ok(active) => {
            ctx.prompt.set_active_context(active.clone());
            Some(active)
        }
        Err(err) => {
            kcsh_core::kcsh_log_debug!(error = %err, "listing without an active context");
            None
        }
    };
    let table = catalog.render_table(active.as_deref());
    writeln!(ctx.out, "{table}")?;
    Ok(())
}

fn list(ctx: &mut BuiltinContext<'_>) -> BuiltinResult {
    let catalog = load_catalog(ctx)?;
    if catalog.is_empty() {
        writeln!(ctx.err, "context: no contexts are configured")?;
        return Ok(Flow::Continue(1));
    }
    print_catalog(ctx, &catalog)?;
    Ok(Flow::Continue(0))
}

fn select(ctx: &mut BuiltinContext<'_>) -> BuiltinResult {
    let catalog = load_catalog(ctx)?;
    if catalog.is_empty() {
        writeln!(ctx.err, "context: no contexts are configured")?;
        return Ok(Flow::Continue(1));
    }
    print_catalog(ctx, &catalog)?;
    ctx.out.flush()?;

    let question = Prompt::plain(format!("select context [1-{}]: ", catalog.len()));
    let answer = match ctx.input.read_line(&question, ctx.notices, ctx.cancel)? {
        ReadOutcome::Line(line) => line,
        ReadOutcome::Interrupted | ReadOutcome::Eof => return Ok(Flow::Continue(1)),
        ReadOutcome::Cancelled => return Ok(Flow::Continue(130)),
    };

    let chosen = catalog
        .find_by_ordinal_token(&answer)
        .map_err(ShellError::from)?
        .name()
        .to_string();
    apply_switch(ctx, &chosen)
}

fn switch_matching(ctx: &mut BuiltinContext<'_>, query: &str) -> BuiltinResult {
    let catalog = load_catalog(ctx)?;
    let Some(target) = catalog.resolve(query) else {
        kcsh_core::kcsh_log_debug!(query, "no context matches");
        return Ok(Flow::Continue(1));
    };
    let target = target.name().to_string();
    apply_switch(ctx, &target)
}

fn apply_switch(ctx: &mut BuiltinContext<'_>, name: &str) -> BuiltinResult {
    match ctx.switch.switch_to(name) {
        Ok(active) => {
            ctx.prompt.set_active_context(active.clone());
            writeln!(ctx.out, "Switched to context \"{active}\".")?;
            Ok(Flow::Continue(0))
        }
        Err(err) => {
            if err.kind == ErrorKind::Client(ClientErrorKind::SwitchNotConfirmed) {
                if let Some(actual) = err.context.get("actual") {
                    ctx.prompt.set_active_context(actual.clone());
                }
            }
            Err(err.into())
        }
    }
}
