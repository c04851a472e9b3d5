use restlock_core::{Command, Event, Outcome};

use super::{print_json, CliResult, Context};

pub fn install() -> CliResult {
    let ctx = Context::open()?;
    let outcome = ctx.serialized(|engine| engine.dispatch(Event::Installed))?;
    print_json(&outcome)
}

pub fn control(command: Command) -> CliResult {
    let ctx = Context::open()?;
    match ctx.serialized(|engine| engine.dispatch(command.into()))? {
        Outcome::Acknowledged { ack } => {
            print_json(&ack)?;
            if ack.ok {
                Ok(())
            } else {
                Err("command failed, see log for details".into())
            }
        }
        other => Err(format!("unexpected outcome: {other:?}").into()),
    }
}

pub fn status() -> CliResult {
    let ctx = Context::open()?;
    print_json(&ctx.serialized(|engine| engine.status())?)
}

pub fn tick() -> CliResult {
    let ctx = Context::open()?;
    print_json(&ctx.serialized(|engine| engine.deliver_due())?)
}
