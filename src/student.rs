use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

pub const MARK_MIN: f64 = 0.0;
pub const MARK_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StudentError {
    #[error("student id must not be empty")]
    EmptyId,
    #[error("subject name must not be empty")]
    EmptySubject,
    #[error("mark {0} is outside 0-100")]
    MarkOutOfRange(f64),
}

/// Letter bucket derived from a student's average.
///
/// | Average | Grade |
/// |---------|-------|
/// | >= 90   | A+    |
/// | >= 80   | A     |
/// | >= 70   | B     |
/// | >= 60   | C     |
/// | >= 50   | D     |
/// | < 50    | F     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Best first.
    pub const ALL: [Grade; 6] = [Grade::APlus, Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    pub fn from_average(avg: f64) -> Self {
        match avg {
            a if a >= 90.0 => Grade::APlus,
            a if a >= 80.0 => Grade::A,
            a if a >= 70.0 => Grade::B,
            a if a >= 60.0 => Grade::C,
            a if a >= 50.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    id: String,
    pub name: String,
    subjects: BTreeMap<String, f64>,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, StudentError> {
        let id = id.into();
        if id.is_empty() {
            return Err(StudentError::EmptyId);
        }
        Ok(Self {
            id,
            name: name.into(),
            subjects: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subjects(&self) -> &BTreeMap<String, f64> {
        &self.subjects
    }

    /// Subjects ordered for display, ignoring case.
    pub fn sorted_subjects(&self) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self
            .subjects
            .iter()
            .map(|(subject, mark)| (subject.as_str(), *mark))
            .collect();
        out.sort_by(|a, b| subject_order(a.0, b.0));
        out
    }

    #[cfg(test)]
    pub fn mark(&self, subject: &str) -> Option<f64> {
        self.subjects.get(subject).copied()
    }

    /// Adds the subject or overwrites its mark. Returns the previous mark.
    pub fn set_mark(
        &mut self,
        subject: impl Into<String>,
        mark: f64,
    ) -> Result<Option<f64>, StudentError> {
        let subject = subject.into();
        if subject.is_empty() {
            return Err(StudentError::EmptySubject);
        }
        if !is_valid_mark(mark) {
            return Err(StudentError::MarkOutOfRange(mark));
        }
        Ok(self.subjects.insert(subject, mark))
    }

    pub fn remove_subject(&mut self, subject: &str) -> bool {
        self.subjects.remove(subject).is_some()
    }

    pub fn total(&self) -> f64 {
        total(self)
    }

    pub fn average(&self) -> f64 {
        average(self)
    }

    pub fn grade(&self) -> Grade {
        grade(self)
    }
}

/// Case-insensitive order; names differing only in case fall back to byte order.
pub fn subject_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn is_valid_mark(mark: f64) -> bool {
    (MARK_MIN..=MARK_MAX).contains(&mark)
}

pub fn total(student: &Student) -> f64 {
    student.subjects.values().sum()
}

pub fn average(student: &Student) -> f64 {
    let n = student.subjects.len();
    if n == 0 {
        return 0.0;
    }
    total(student) / (n as f64)
}

pub fn grade(student: &Student) -> Grade {
    Grade::from_average(average(student))
}
