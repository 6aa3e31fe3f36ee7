//! Postgres-backed course store.
//!
//! ## Schema
//!
//! `courses` and `students` get `BIGSERIAL` ids; `course_students` links them,
//! with `position` preserving enrollment order. Both foreign keys cascade, so
//! deleting either side drops the link rows only.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (foreign key violation) | `23503` | `Domain(Validation)` | Student deleted between the existence check and the link insert |
//! | Database (other) | Any other | `Backend` | Constraint or SQL failure |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresCourseStore` is `Send + Sync`; every multi-statement write runs in
//! one transaction.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use campus_core::{CourseId, DomainError, Entity, StudentId};
use campus_courses::{Course, CourseDraft, CourseFilter, CoursePatch, EnrollmentLimits, Student, StudentDraft};

use super::{unknown_student, CourseStore, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id         BIGSERIAL PRIMARY KEY,
        name       TEXT NOT NULL,
        birth_date DATE NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS courses (
        id   BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS course_students (
        course_id  BIGINT  NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        student_id BIGINT  NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        position   INTEGER NOT NULL,
        PRIMARY KEY (course_id, student_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS courses_name_idx ON courses (name)",
];

/// Postgres-backed implementation of `CourseStore`.
#[derive(Debug, Clone)]
pub struct PostgresCourseStore {
    pool: PgPool,
}

impl PostgresCourseStore {
    /// Wrap an existing pool. Call `migrate` before first use on a fresh database.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create tables and indexes if they are missing (idempotent).
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        tracing::info!("course schema ready");
        Ok(())
    }

    /// Load enrollment lists for a set of courses, keyed by course id.
    async fn load_enrollments<'e, E>(
        executor: E,
        course_ids: &[i64],
    ) -> StoreResult<BTreeMap<i64, Vec<StudentId>>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query(
            r#"
            SELECT course_id, student_id
            FROM course_students
            WHERE course_id = ANY($1)
            ORDER BY course_id ASC, position ASC
            "#,
        )
        .bind(course_ids)
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error("load_enrollments", e))?;

        let mut enrollments: BTreeMap<i64, Vec<StudentId>> = BTreeMap::new();
        for row in rows {
            let course_id: i64 = try_get(&row, "course_id")?;
            let student_id: i64 = try_get(&row, "student_id")?;
            enrollments
                .entry(course_id)
                .or_default()
                .push(StudentId::new(student_id));
        }
        Ok(enrollments)
    }

    async fn ensure_students_exist(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[StudentId],
    ) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query("SELECT id FROM students WHERE id = ANY($1)")
            .bind(&raw)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("ensure_students_exist", e))?;

        let mut found = HashSet::with_capacity(rows.len());
        for row in rows {
            found.insert(try_get::<i64>(&row, "id")?);
        }

        match ids.iter().find(|id| !found.contains(&id.get())) {
            Some(missing) => Err(unknown_student(*missing)),
            None => Ok(()),
        }
    }

    async fn insert_enrollments(
        tx: &mut Transaction<'_, Postgres>,
        course_id: CourseId,
        students: &[StudentId],
    ) -> StoreResult<()> {
        for (position, student_id) in students.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO course_students (course_id, student_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(course_id.get())
            .bind(student_id.get())
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_enrollments", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CourseStore for PostgresCourseStore {
    #[instrument(skip(self), err)]
    async fn list_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name
            FROM courses
            WHERE ($1::BIGINT IS NULL OR id = $1)
              AND ($2::TEXT IS NULL OR name = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(filter.id.map(CourseId::get))
        .bind(filter.name.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_courses", e))?;

        let mut heads = Vec::with_capacity(rows.len());
        for row in &rows {
            heads.push((try_get::<i64>(row, "id")?, try_get::<String>(row, "name")?));
        }

        let ids: Vec<i64> = heads.iter().map(|(id, _)| *id).collect();
        let mut enrollments = Self::load_enrollments(&self.pool, &ids).await?;

        Ok(heads
            .into_iter()
            .map(|(id, name)| Course {
                id: CourseId::new(id),
                name,
                students: enrollments.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(course_id = %id), err)]
    async fn get_course(&self, id: CourseId) -> StoreResult<Course> {
        let row = sqlx::query("SELECT id, name FROM courses WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_course", e))?
            .ok_or_else(|| not_found::<Course>(id))?;

        let name: String = try_get(&row, "name")?;
        let mut enrollments = Self::load_enrollments(&self.pool, &[id.get()]).await?;

        Ok(Course {
            id,
            name,
            students: enrollments.remove(&id.get()).unwrap_or_default(),
        })
    }

    #[instrument(skip(self, draft), err)]
    async fn create_course(&self, draft: CourseDraft) -> StoreResult<Course> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Self::ensure_students_exist(&mut tx, draft.students()).await?;

        let row = sqlx::query("INSERT INTO courses (name) VALUES ($1) RETURNING id")
            .bind(draft.name())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_course", e))?;
        let id = CourseId::new(try_get(&row, "id")?);

        Self::insert_enrollments(&mut tx, id, draft.students()).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::debug!(course_id = %id, "course created");
        Ok(draft.into_course(id))
    }

    #[instrument(skip(self, patch, limits), fields(course_id = %id), err)]
    async fn update_course(
        &self,
        id: CourseId,
        patch: &CoursePatch,
        limits: &EnrollmentLimits,
    ) -> StoreResult<Course> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query("SELECT name FROM courses WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_course", e))?
            .ok_or_else(|| not_found::<Course>(id))?;

        let mut enrollments = Self::load_enrollments(&mut *tx, &[id.get()]).await?;
        let current = Course {
            id,
            name: try_get(&row, "name")?,
            students: enrollments.remove(&id.get()).unwrap_or_default(),
        };

        let draft = patch.apply(&current, limits)?;

        sqlx::query("UPDATE courses SET name = $2 WHERE id = $1")
            .bind(id.get())
            .bind(draft.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_course", e))?;

        if patch.touches_students() {
            Self::ensure_students_exist(&mut tx, draft.students()).await?;

            sqlx::query("DELETE FROM course_students WHERE course_id = $1")
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_course", e))?;

            Self::insert_enrollments(&mut tx, id, draft.students()).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::debug!(course_id = %id, "course updated");
        Ok(draft.into_course(id))
    }

    #[instrument(skip(self), fields(course_id = %id), err)]
    async fn delete_course(&self, id: CourseId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_course", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found::<Course>(id));
        }

        tracing::debug!(course_id = %id, "course deleted");
        Ok(())
    }

    async fn count_courses(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM courses")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_courses", e))?;
        let count: i64 = try_get(&row, "count")?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self), err)]
    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query("SELECT id, name, birth_date FROM students ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_students", e))?;

        rows.iter().map(row_to_student).collect()
    }

    #[instrument(skip(self), fields(student_id = %id), err)]
    async fn get_student(&self, id: StudentId) -> StoreResult<Student> {
        let row = sqlx::query("SELECT id, name, birth_date FROM students WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_student", e))?
            .ok_or_else(|| not_found::<Student>(id))?;

        row_to_student(&row)
    }

    #[instrument(skip(self, draft), err)]
    async fn create_student(&self, draft: StudentDraft) -> StoreResult<Student> {
        let row = sqlx::query("INSERT INTO students (name, birth_date) VALUES ($1, $2) RETURNING id")
            .bind(draft.name())
            .bind(draft.birth_date())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_student", e))?;
        let id = StudentId::new(try_get(&row, "id")?);

        tracing::debug!(student_id = %id, "student created");
        Ok(draft.into_student(id))
    }

    #[instrument(skip(self), fields(student_id = %id), err)]
    async fn delete_student(&self, id: StudentId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_student", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found::<Student>(id));
        }

        tracing::debug!(student_id = %id, "student deleted");
        Ok(())
    }
}

fn not_found<E: Entity>(id: E::Id) -> StoreError {
    DomainError::not_found(E::KIND, id).into()
}

fn row_to_student(row: &PgRow) -> StoreResult<Student> {
    Ok(Student {
        id: StudentId::new(try_get(row, "id")?),
        name: try_get(row, "name")?,
        birth_date: try_get::<Option<NaiveDate>>(row, "birth_date")?,
    })
}

fn try_get<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(column)
        .map_err(|e| map_sqlx_error("decode_row", e))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Foreign key violation: a referenced student vanished mid-write.
                Some("23503") => DomainError::validation(msg).into(),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_backend_error() {
        let err = map_sqlx_error("list_courses", sqlx::Error::PoolClosed);
        match err {
            StoreError::Backend(msg) => assert!(msg.contains("list_courses")),
            other => panic!("expected Backend, got {other:?}"),
        }
    }

    #[test]
    fn schema_creates_link_table_after_both_sides() {
        let position = |needle: &str| SCHEMA.iter().position(|s| s.contains(needle)).unwrap();
        assert!(position("TABLE IF NOT EXISTS course_students") > position("TABLE IF NOT EXISTS courses"));
        assert!(position("TABLE IF NOT EXISTS course_students") > position("TABLE IF NOT EXISTS students"));
    }

    fn unique(prefix: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{prefix}-{nanos}")
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a disposable Postgres database"]
    async fn course_lifecycle_against_postgres() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = PostgresCourseStore::connect(&url, 2).await.unwrap();
        // Re-running the schema bootstrap must be harmless.
        store.migrate().await.unwrap();
        let limits = EnrollmentLimits::default();

        let ada = store
            .create_student(StudentDraft::new(&unique("Ada"), None).unwrap())
            .await
            .unwrap();
        let bob = store
            .create_student(StudentDraft::new(&unique("Bob"), None).unwrap())
            .await
            .unwrap();

        let name = unique("Chemistry");
        let draft = CourseDraft::new(&name, vec![bob.id, ada.id, bob.id], &limits).unwrap();
        let course = store.create_course(draft).await.unwrap();
        assert_eq!(course.students, vec![bob.id, ada.id]);
        assert_eq!(store.get_course(course.id).await.unwrap(), course);

        let by_name = store.list_courses(&CourseFilter::by_name(&name)).await.unwrap();
        assert_eq!(by_name, vec![course.clone()]);
        let by_id = store.list_courses(&CourseFilter::by_id(course.id)).await.unwrap();
        assert_eq!(by_id, vec![course.clone()]);

        // Unknown student: the whole update is rolled back, name included.
        let bad = CoursePatch {
            name: Some(unique("Renamed")),
            students: Some(vec![ada.id, StudentId::new(i64::MAX)]),
        };
        let err = store.update_course(course.id, &bad, &limits).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert_eq!(store.get_course(course.id).await.unwrap(), course);

        let rename = CoursePatch {
            name: Some(unique("Physics")),
            students: None,
        };
        let renamed = store.update_course(course.id, &rename, &limits).await.unwrap();
        assert_eq!(renamed.students, course.students);
        assert_eq!(store.get_course(course.id).await.unwrap(), renamed);

        store.delete_student(ada.id).await.unwrap();
        assert_eq!(store.get_course(course.id).await.unwrap().students, vec![bob.id]);

        store.delete_course(course.id).await.unwrap();
        assert!(store.get_course(course.id).await.unwrap_err().is_not_found());
        assert!(store.delete_course(course.id).await.unwrap_err().is_not_found());
        assert_eq!(store.get_student(bob.id).await.unwrap(), bob);

        store.delete_student(bob.id).await.unwrap();
    }
}
