use std::error::Error;

use chrono::Utc;
use clap::Subcommand;
use studylog_core::CatalogProvider;

use super::context::Context;
use super::print_json;

#[derive(Subcommand)]
pub enum LectureAction {
    /// Add a lecture goal under a subject
    Add {
        title: String,
        /// Subject the lecture belongs to
        #[arg(long)]
        subject: String,
        /// Study time goal in minutes
        #[arg(long, default_value = "60")]
        target: u32,
    },
    /// List lectures, optionally for one subject
    List {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Remove a lecture by id
    Remove { id: String },
    /// Minutes logged against each lecture goal
    Progress,
}

pub async fn run(action: LectureAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match action {
        LectureAction::Add {
            title,
            subject,
            target,
        } => {
            ctx.require_local("lecture add")?;
            let lecture = ctx
                .db
                .add_lecture(&ctx.user_id, &title, &subject, target, Utc::now())?;
            print_json(&lecture)?;
        }
        LectureAction::List {
            subject: Some(subject),
        } => {
            let lectures = ctx
                .backend()
                .list_lectures_for_subject(&ctx.user_id, subject.trim())
                .await?;
            print_json(&lectures)?;
        }
        LectureAction::List { subject: None } => {
            if ctx.is_remote() {
                return Err("--subject is required while the remote store is enabled".into());
            }
            print_json(&ctx.db.lectures(&ctx.user_id, None)?)?;
        }
        LectureAction::Remove { id } => {
            ctx.require_local("lecture remove")?;
            if !ctx.db.remove_lecture(&ctx.user_id, &id)? {
                return Err(format!("no lecture with id '{id}'").into());
            }
            println!("removed lecture {id}");
        }
        LectureAction::Progress => {
            ctx.warn_if_remote();
            print_json(&ctx.db.lecture_progress(&ctx.user_id)?)?;
        }
    }
    Ok(())
}
