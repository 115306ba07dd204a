//! `exit` builtin - end the session with an optional status.
//! Usage: `exit [N]`. Without N the status of the last command is used.

use kcsh_core::error::{ShellError, UserInputErrorKind};

use crate::common::{BuiltinContext, BuiltinResult, Flow};
use crate::Builtin;

pub struct ExitCommand;

impl Builtin for ExitCommand {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn synopsis(&self) -> &'static str {
        "Leave kcsh"
    }

    fn usage(&self) -> &'static str {
        "exit [N]"
    }

    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult {
        let status = match args {
            [] => i64::from(ctx.last_status),
            [code] => code.trim().parse::<i64>().map_err(|_| {
                ShellError::user_input(
                    UserInputErrorKind::NotAnInteger,
                    format!("{code}: numeric argument required"),
                )
            })?,
            _ => {
                return Err(ShellError::user_input(
                    UserInputErrorKind::TooManyArguments,
                    "too many arguments",
                )
                .into())
            }
        };
        Ok(Flow::Exit(status.rem_euclid(256) as i32))
    }
}
