//! Infrastructure layer: storage backends and configuration.

pub mod config;
pub mod store;

pub use config::AppConfig;
pub use store::{CourseStore, InMemoryCourseStore, PostgresCourseStore, StoreError, StoreResult};
