use crate::{
    config::Config,
    db::Database,
    directory::{CourseDirectory, StaticCourseDirectory},
    messages::MessageStore,
    session::SessionRegistry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub messages: Arc<MessageStore>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let directory: Arc<dyn CourseDirectory> =
            Arc::new(StaticCourseDirectory::new(&config.courses));
        let registry = SessionRegistry::new(db.clone(), directory, &config.qna);
        Self::with_registry(db, config, registry)
    }

    /// Build state around a pre-configured registry (custom code source, directory)
    pub fn with_registry(db: Database, config: Config, registry: SessionRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            messages: Arc::new(MessageStore::new(db)),
        }
    }
}
