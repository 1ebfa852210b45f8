use std::error::Error;

use clap::Subcommand;
use studylog_core::catalog::DEFAULT_SUBJECT_COLOR;
use studylog_core::CatalogProvider;

use super::context::Context;
use super::print_json;

#[derive(Subcommand)]
pub enum SubjectAction {
    /// Add a subject, or recolor an existing one
    Add {
        name: String,
        /// Legend color as #rrggbb
        #[arg(long, default_value = DEFAULT_SUBJECT_COLOR)]
        color: String,
    },
    /// List subjects
    List,
    /// Remove a subject (recorded sessions keep their category)
    Remove { name: String },
}

pub async fn run(action: SubjectAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match action {
        SubjectAction::Add { name, color } => {
            ctx.require_local("subject add")?;
            let subject = ctx.db.add_subject(&ctx.user_id, &name, &color)?;
            print_json(&subject)?;
        }
        SubjectAction::List => {
            let subjects = ctx.backend().list_subjects(&ctx.user_id).await?;
            print_json(&subjects)?;
        }
        SubjectAction::Remove { name } => {
            ctx.require_local("subject remove")?;
            if !ctx.db.remove_subject(&ctx.user_id, &name)? {
                return Err(format!("no subject named '{}'", name.trim()).into());
            }
            println!("removed subject '{}'", name.trim());
        }
    }
    Ok(())
}
