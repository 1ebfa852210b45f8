use std::error::Error;

use studylog_core::error::Result;
use studylog_core::{
    BellNotifier, CatalogProvider, ChainNotifier, CommandNotifier, Config, ControllerOptions,
    Database, LectureRef, NewSession, Notifier, RemoteStore, SessionRecorder, Subject,
};

/// Everything a command needs: config, the local database, the acting user
/// and, when enabled, the hosted store.
pub struct Context {
    pub config: Config,
    pub db: Database,
    pub user_id: String,
    remote: Option<RemoteStore>,
}

impl Context {
    pub fn load(user: Option<String>) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let db = Database::open()?;
        let user_id = user
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| config.profile.user_id.clone());
        let remote = if config.remote.enabled {
            Some(RemoteStore::new(&config.remote)?)
        } else {
            None
        };
        tracing::debug!(%user_id, remote = remote.is_some(), "context loaded");
        Ok(Self {
            config,
            db,
            user_id,
            remote,
        })
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Where new sessions go and where catalogs are read from.
    pub fn backend(&self) -> Backend<'_> {
        match &self.remote {
            Some(remote) => Backend::Remote(remote),
            None => Backend::Local(&self.db),
        }
    }

    /// Local catalog edits make no sense while the hosted store owns it.
    pub fn require_local(&self, what: &str) -> Result<(), Box<dyn Error>> {
        if self.is_remote() {
            return Err(format!("{what} manages the local catalog; disable remote.enabled first").into());
        }
        Ok(())
    }

    /// Views computed from the local database miss remote sessions.
    pub fn warn_if_remote(&self) {
        if self.is_remote() {
            tracing::warn!("remote store enabled; showing locally recorded sessions only");
        }
    }

    pub fn notifier(&self) -> ChainNotifier {
        let settings = &self.config.notifications;
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if settings.enabled {
            if let Some(command) = settings.sound_command.as_deref().filter(|c| !c.trim().is_empty()) {
                notifiers.push(Box::new(CommandNotifier::new(command)));
            }
            if settings.bell {
                notifiers.push(Box::new(BellNotifier));
            }
        }
        ChainNotifier::new(notifiers)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            user_id: self.user_id.clone(),
            default_minutes: self.config.timer.default_minutes,
            defaults: self.config.record_defaults(),
        }
    }
}

/// The active store, local SQLite or hosted.
pub enum Backend<'a> {
    Local(&'a Database),
    Remote(&'a RemoteStore),
}

impl SessionRecorder for Backend<'_> {
    async fn submit(&self, session: &NewSession) -> Result<()> {
        match self {
            Backend::Local(db) => db.submit(session).await,
            Backend::Remote(remote) => remote.submit(session).await,
        }
    }
}

impl CatalogProvider for Backend<'_> {
    async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        match self {
            Backend::Local(db) => db.list_subjects(user_id).await,
            Backend::Remote(remote) => remote.list_subjects(user_id).await,
        }
    }

    async fn list_lectures_for_subject(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<LectureRef>> {
        match self {
            Backend::Local(db) => db.list_lectures_for_subject(user_id, subject).await,
            Backend::Remote(remote) => remote.list_lectures_for_subject(user_id, subject).await,
        }
    }
}
