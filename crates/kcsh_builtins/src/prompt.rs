//! `prompt` builtin command - show or hide the context in the prompt

use kcsh_core::error::{ShellError, UserInputErrorKind};

use crate::common::{BuiltinContext, BuiltinResult, Flow};
use crate::Builtin;

pub struct PromptCommand;

impl Builtin for PromptCommand {
    fn name(&self) -> &'static str {
        "prompt"
    }

    fn synopsis(&self) -> &'static str {
        "Toggle the context shown in the prompt"
    }

    fn usage(&self) -> &'static str {
        "prompt [on | off]"
    }

    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult {
        match args {
            [] => {
                ctx.prompt.toggle();
            }
            [value] => ctx.prompt.set_enabled(parse_switch(value)?),
            _ => {
                return Err(ShellError::user_input(
                    UserInputErrorKind::TooManyArguments,
                    format!("too many arguments\nusage: {}", self.usage()),
                )
                .into())
            }
        }
        Ok(Flow::Continue(0))
    }
}

/// `on` or `off`, in any case
pub fn parse_switch(value: &str) -> Result<bool, ShellError> {
    if value.eq_ignore_ascii_case("on") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("off") {
        Ok(false)
    } else {
        Err(ShellError::user_input(
            UserInputErrorKind::UnknownSubcommand,
            format!("'{value}' is not 'on' or 'off'"),
        ))
    }
}
