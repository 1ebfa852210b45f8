use std::error::Error;

use clap::Subcommand;

use super::context::Context;
use super::print_json;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent sessions first, as JSON
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Delete a recorded session
    Delete { id: i64 },
}

pub fn run(action: HistoryAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match action {
        HistoryAction::List { limit } => {
            ctx.warn_if_remote();
            print_json(&ctx.db.recent_sessions(&ctx.user_id, limit)?)?;
        }
        HistoryAction::Delete { id } => {
            if !ctx.db.delete_session(&ctx.user_id, id)? {
                return Err(format!("no session with id {id}").into());
            }
            println!("deleted session {id}");
        }
    }
    Ok(())
}
