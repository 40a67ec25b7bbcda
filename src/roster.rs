use crate::student::Student;
use log::debug;
use std::collections::HashMap;

/// In-memory store of every student in the session, keyed by id.
#[derive(Debug, Default)]
pub struct Roster {
    students: HashMap<String, Student>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.students.contains_key(id)
    }

    /// Inserts the student unless the id is taken. An existing record is
    /// never replaced; callers check `exists` first to tell the user.
    pub fn add(&mut self, student: Student) -> bool {
        if self.exists(student.id()) {
            debug!("rejected duplicate student id {}", student.id());
            return false;
        }
        debug!(
            "added student {} with {} subjects",
            student.id(),
            student.subjects().len()
        );
        self.students.insert(student.id().to_string(), student);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Student> {
        self.students.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.students.remove(id).is_some();
        if removed {
            debug!("removed student {}", id);
        }
        removed
    }

    /// All students ordered by id ascending.
    pub fn list_all(&self) -> Vec<&Student> {
        let mut out: Vec<&Student> = self.students.values().collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.students.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
