use clap::Subcommand;
use restlock_core::{Event, NavigationPhase, SurfaceController, SurfaceError};
use serde_json::json;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SurfaceAction {
    /// Open a surface (blank when no resource is given)
    Open {
        /// Resource to display
        resource: Option<String>,
    },
    /// Point a surface at another resource
    Navigate {
        /// Surface ID
        id: u64,
        /// Resource to display
        resource: String,
    },
    /// Close a surface
    Close {
        /// Surface ID
        id: u64,
    },
    /// List open surfaces as JSON
    List,
}

pub fn run(action: SurfaceAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        SurfaceAction::Open { resource } => {
            let (surface, outcome) = ctx.serialized(|engine| {
                let surface = ctx.db.open_surface(resource.as_deref())?;
                let outcome = engine.dispatch(Event::SurfaceCreated {
                    surface: surface.clone(),
                })?;
                Ok((surface, outcome))
            })?;
            print_json(&json!({ "surface": surface, "outcome": outcome }))?;
        }
        SurfaceAction::Navigate { id, resource } => {
            let (current, outcome) = ctx.serialized(|engine| {
                ctx.db.set_resource(id, &resource)?;
                let surface =
                    SurfaceController::get(&ctx.db, id)?.ok_or(SurfaceError::NotFound(id))?;
                let outcome = engine.dispatch(Event::SurfaceNavigated {
                    surface,
                    phase: NavigationPhase::Complete,
                })?;
                Ok((SurfaceController::get(&ctx.db, id)?, outcome))
            })?;
            print_json(&json!({ "surface": current, "outcome": outcome }))?;
        }
        SurfaceAction::Close { id } => {
            let closed = ctx.db.close_surface(id)?;
            if !closed {
                return Err(SurfaceError::NotFound(id).into());
            }
            print_json(&json!({ "closed": id }))?;
        }
        SurfaceAction::List => {
            print_json(&ctx.db.list_all()?)?;
        }
    }
    Ok(())
}
