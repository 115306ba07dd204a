//! `help` builtin command
//!
//! `help` lists the kcsh builtins, `help <builtin>` describes one of them,
//! and any other topic is handed to the host shell's own `help`.

use std::io::Write;

use crate::common::host::run_in_host;
use crate::common::{BuiltinContext, BuiltinResult, Flow};
use crate::registry::get_builtin_registry;
use crate::Builtin;

pub struct HelpCommand;

const CONTEXT_TOPIC: &str = "\
context                 print the active context
context list            list the configured contexts; `*` marks the active one
context select          list the contexts, then switch by entering a number
context <name>          switch to <name>, or to the first context whose name
                        contains <name>; nothing happens when none matches

Sub-command keywords are case-insensitive.";

const PROMPT_TOPIC: &str = "\
prompt                  toggle the `(context)` prefix of the prompt
prompt on | off         show or hide the prefix explicitly";

impl Builtin for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn synopsis(&self) -> &'static str {
        "Describe kcsh builtins, or ask the host shell"
    }

    fn usage(&self) -> &'static str {
        "help [TOPIC]"
    }

    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult {
        let Some(topic) = args.first() else {
            general_help(ctx.out)?;
            return Ok(Flow::Continue(0));
        };

        if topic.eq_ignore_ascii_case("context") {
            writeln!(ctx.out, "{CONTEXT_TOPIC}")?;
        } else if topic.eq_ignore_ascii_case("prompt") {
            writeln!(ctx.out, "{PROMPT_TOPIC}")?;
        } else if let Some(builtin) = get_builtin_registry().get(topic) {
            writeln!(ctx.out, "{}: {}\n    {}", builtin.name(), builtin.usage(), builtin.synopsis())?;
        } else {
            ctx.out.flush()?;
            let status = run_in_host(ctx.host_shell, &format!("help {}", quote(topic)))?;
            return Ok(Flow::Continue(status));
        }
        Ok(Flow::Continue(0))
    }
}

fn general_help(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "kcsh {} - kubectl context shell", env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    for builtin in get_builtin_registry().iter() {
        writeln!(out, "  {:<44} {}", builtin.usage(), builtin.synopsis())?;
    }
    writeln!(out)?;
    writeln!(out, "Every other line runs in the host shell.")?;
    writeln!(out, "`help context` and `help prompt` describe those commands in detail.")
}

/// Single-quote `word` for `sh -c`
fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
