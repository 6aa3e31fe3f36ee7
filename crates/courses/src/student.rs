use chrono::NaiveDate;

use campus_core::{DomainResult, Entity, StudentId};

use crate::validation::normalize_name;

/// A stored student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
}

impl Entity for Student {
    type Id = StudentId;
    const KIND: &'static str = "student";

    fn id(&self) -> StudentId {
        self.id
    }
}

/// Validated field values for a new student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDraft {
    name: String,
    birth_date: Option<NaiveDate>,
}

impl StudentDraft {
    pub fn new(name: &str, birth_date: Option<NaiveDate>) -> DomainResult<Self> {
        Ok(Self {
            name: normalize_name("name", name)?,
            birth_date,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.birth_date
    }

    pub fn into_student(self, id: StudentId) -> Student {
        Student {
            id,
            name: self.name,
            birth_date: self.birth_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::DomainError;

    #[test]
    fn draft_keeps_birth_date() {
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        let student = StudentDraft::new("Ada", Some(date))
            .unwrap()
            .into_student(StudentId::new(8));
        assert_eq!(student.id, StudentId::new(8));
        assert_eq!(student.name, "Ada");
        assert_eq!(student.birth_date, Some(date));
    }

    #[test]
    fn draft_rejects_blank_name() {
        assert!(matches!(
            StudentDraft::new("", None),
            Err(DomainError::Validation(_))
        ));
    }
}
