use std::sync::Arc;

use campus_courses::EnrollmentLimits;
use campus_infra::{AppConfig, CourseStore, InMemoryCourseStore, PostgresCourseStore, StoreResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn CourseStore>,
    limits: EnrollmentLimits,
}

impl AppServices {
    pub fn new(store: Arc<dyn CourseStore>, limits: EnrollmentLimits) -> Self {
        Self { store, limits }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(limits: EnrollmentLimits) -> Self {
        Self::new(Arc::new(InMemoryCourseStore::new()), limits)
    }

    pub fn store(&self) -> &dyn CourseStore {
        self.store.as_ref()
    }

    pub fn limits(&self) -> &EnrollmentLimits {
        &self.limits
    }
}

/// Pick the storage backend from configuration.
///
/// Persistent stores need `DATABASE_URL`; without it we fall back to in-memory.
pub async fn build_services(config: &AppConfig) -> StoreResult<AppServices> {
    let limits = EnrollmentLimits::new(config.max_students_per_course);

    if !config.use_persistent_stores {
        tracing::info!("using in-memory course store");
        return Ok(AppServices::in_memory(limits));
    }

    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but DATABASE_URL not set, falling back to in-memory"
        );
        return Ok(AppServices::in_memory(limits));
    };

    let store = PostgresCourseStore::connect(database_url, config.database_max_connections).await?;
    tracing::info!("using postgres course store");
    Ok(AppServices::new(Arc::new(store), limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persistent_without_database_url_falls_back_to_in_memory() {
        let config = AppConfig {
            use_persistent_stores: true,
            database_url: None,
            max_students_per_course: 4,
            ..AppConfig::default()
        };

        let services = build_services(&config).await.unwrap();
        assert_eq!(services.limits().max_students, 4);
        assert_eq!(services.store().count_courses().await.unwrap(), 0);
    }
}
