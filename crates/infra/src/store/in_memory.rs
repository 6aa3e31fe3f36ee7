use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use campus_core::{CourseId, DomainError, Entity, StudentId};
use campus_courses::{Course, CourseDraft, CourseFilter, CoursePatch, EnrollmentLimits, Student, StudentDraft};

use super::{unknown_student, CourseStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    courses: BTreeMap<CourseId, Course>,
    students: BTreeMap<StudentId, Student>,
    // Last id handed out; ids are never reused after delete.
    last_course_id: i64,
    last_student_id: i64,
}

impl Tables {
    fn ensure_students_exist(&self, ids: &[StudentId]) -> StoreResult<()> {
        match ids.iter().find(|id| !self.students.contains_key(id)) {
            Some(missing) => Err(unknown_student(*missing)),
            None => Ok(()),
        }
    }
}

/// In-memory course store.
///
/// Intended for tests/dev. Ordered maps keep listings sorted by id.
#[derive(Debug, Default)]
pub struct InMemoryCourseStore {
    tables: RwLock<Tables>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

fn not_found<E: Entity>(id: E::Id) -> StoreError {
    DomainError::not_found(E::KIND, id).into()
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn list_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>> {
        let tables = self.read()?;
        Ok(tables
            .courses
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn get_course(&self, id: CourseId) -> StoreResult<Course> {
        let tables = self.read()?;
        tables
            .courses
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found::<Course>(id))
    }

    async fn create_course(&self, draft: CourseDraft) -> StoreResult<Course> {
        let mut tables = self.write()?;
        tables.ensure_students_exist(draft.students())?;

        tables.last_course_id += 1;
        let course = draft.into_course(CourseId::new(tables.last_course_id));
        tables.courses.insert(course.id, course.clone());

        tracing::debug!(course_id = %course.id, "course created");
        Ok(course)
    }

    async fn update_course(
        &self,
        id: CourseId,
        patch: &CoursePatch,
        limits: &EnrollmentLimits,
    ) -> StoreResult<Course> {
        let mut tables = self.write()?;
        let current = tables
            .courses
            .get(&id)
            .ok_or_else(|| not_found::<Course>(id))?;

        let draft = patch.apply(current, limits)?;
        if patch.touches_students() {
            tables.ensure_students_exist(draft.students())?;
        }

        let course = draft.into_course(id);
        tables.courses.insert(id, course.clone());

        tracing::debug!(course_id = %id, "course updated");
        Ok(course)
    }

    async fn delete_course(&self, id: CourseId) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables
            .courses
            .remove(&id)
            .ok_or_else(|| not_found::<Course>(id))?;

        tracing::debug!(course_id = %id, "course deleted");
        Ok(())
    }

    async fn count_courses(&self) -> StoreResult<u64> {
        Ok(self.read()?.courses.len() as u64)
    }

    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        Ok(self.read()?.students.values().cloned().collect())
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Student> {
        let tables = self.read()?;
        tables
            .students
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found::<Student>(id))
    }

    async fn create_student(&self, draft: StudentDraft) -> StoreResult<Student> {
        let mut tables = self.write()?;
        tables.last_student_id += 1;
        let student = draft.into_student(StudentId::new(tables.last_student_id));
        tables.students.insert(student.id, student.clone());

        tracing::debug!(student_id = %student.id, "student created");
        Ok(student)
    }

    async fn delete_student(&self, id: StudentId) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables
            .students
            .remove(&id)
            .ok_or_else(|| not_found::<Student>(id))?;

        for course in tables.courses.values_mut() {
            course.students.retain(|s| *s != id);
        }

        tracing::debug!(student_id = %id, "student deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limits() -> EnrollmentLimits {
        EnrollmentLimits::default()
    }

    async fn seed_course(store: &InMemoryCourseStore, name: &str, students: Vec<StudentId>) -> Course {
        let draft = CourseDraft::new(name, students, &limits()).unwrap();
        store.create_course(draft).await.unwrap()
    }

    async fn seed_student(store: &InMemoryCourseStore, name: &str) -> Student {
        let draft = StudentDraft::new(name, None).unwrap();
        store.create_student(draft).await.unwrap()
    }

    #[tokio::test]
    async fn ids_are_sequential_and_not_reused() {
        let store = InMemoryCourseStore::new();
        let a = seed_course(&store, "A", vec![]).await;
        let b = seed_course(&store, "B", vec![]).await;
        assert_eq!(a.id, CourseId::new(1));
        assert_eq!(b.id, CourseId::new(2));

        store.delete_course(b.id).await.unwrap();
        let c = seed_course(&store, "C", vec![]).await;
        assert_eq!(c.id, CourseId::new(3));
    }

    #[tokio::test]
    async fn list_is_ordered_and_filtered() {
        let store = InMemoryCourseStore::new();
        for name in ["Chemistry", "Biology", "Chemistry"] {
            seed_course(&store, name, vec![]).await;
        }

        let all = store.list_courses(&CourseFilter::default()).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let chem = store
            .list_courses(&CourseFilter::by_name("Chemistry"))
            .await
            .unwrap();
        assert_eq!(chem.len(), 2);
        assert!(chem.iter().all(|c| c.name == "Chemistry"));

        let second = store
            .list_courses(&CourseFilter::by_id(CourseId::new(2)))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Biology");
    }

    #[tokio::test]
    async fn create_rejects_unknown_students() {
        let store = InMemoryCourseStore::new();
        let draft = CourseDraft::new("A", vec![StudentId::new(99)], &limits()).unwrap();

        let err = store.create_course(draft).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert_eq!(store.count_courses().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_patches_only_supplied_fields() {
        let store = InMemoryCourseStore::new();
        let ada = seed_student(&store, "Ada").await;
        let course = seed_course(&store, "Old", vec![ada.id]).await;

        let patch = CoursePatch {
            name: Some("New".to_string()),
            students: None,
        };
        let updated = store.update_course(course.id, &patch, &limits()).await.unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.students, vec![ada.id]);
        assert_eq!(store.get_course(course.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn failed_update_leaves_course_untouched() {
        let store = InMemoryCourseStore::new();
        let course = seed_course(&store, "Old", vec![]).await;

        let patch = CoursePatch {
            name: Some("New".to_string()),
            students: Some(vec![StudentId::new(5)]),
        };
        assert!(store.update_course(course.id, &patch, &limits()).await.is_err());
        assert_eq!(store.get_course(course.id).await.unwrap(), course);
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let store = InMemoryCourseStore::new();
        let id = CourseId::new(7);

        assert!(store.get_course(id).await.unwrap_err().is_not_found());
        assert!(store.delete_course(id).await.unwrap_err().is_not_found());
        assert!(
            store
                .update_course(id, &CoursePatch::default(), &limits())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn deleting_student_unenrolls_everywhere() {
        let store = InMemoryCourseStore::new();
        let ada = seed_student(&store, "Ada").await;
        let bob = seed_student(&store, "Bob").await;
        let course = seed_course(&store, "A", vec![ada.id, bob.id]).await;

        store.delete_student(ada.id).await.unwrap();

        let course = store.get_course(course.id).await.unwrap();
        assert_eq!(course.students, vec![bob.id]);
        assert!(store.get_student(ada.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deleting_course_keeps_students() {
        let store = InMemoryCourseStore::new();
        let ada = seed_student(&store, "Ada").await;
        let course = seed_course(&store, "A", vec![ada.id]).await;

        store.delete_course(course.id).await.unwrap();

        assert_eq!(store.count_courses().await.unwrap(), 0);
        assert_eq!(store.list_students().await.unwrap(), vec![ada]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Delete(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Create),
            1 => (0usize..16).prop_map(Op::Delete),
        ]
    }

    proptest! {
        /// Property: across any create/delete sequence, ids strictly increase
        /// (so none is reused) and listings stay ordered by id.
        #[test]
        fn ids_increase_and_are_never_reused(ops in prop::collection::vec(op(), 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryCourseStore::new();
                let mut last_issued: Option<CourseId> = None;
                let mut live: Vec<CourseId> = Vec::new();

                for op in ops {
                    match op {
                        Op::Create => {
                            let course = seed_course(&store, "P", vec![]).await;
                            if let Some(last) = last_issued {
                                assert!(course.id > last, "{} issued after {}", course.id, last);
                            }
                            last_issued = Some(course.id);
                            live.push(course.id);
                        }
                        Op::Delete(pick) => {
                            if !live.is_empty() {
                                let id = live.remove(pick % live.len());
                                store.delete_course(id).await.unwrap();
                            }
                        }
                    }

                    let listed: Vec<CourseId> = store
                        .list_courses(&CourseFilter::default())
                        .await
                        .unwrap()
                        .iter()
                        .map(|c| c.id)
                        .collect();
                    assert_eq!(listed, live);
                }
            });
        }
    }
}
