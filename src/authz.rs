// src/authz.rs

use serde::{Deserialize, Serialize};

/// Closed role enumeration. Stored in the database and in token claims as
/// the uppercase strings `ADMIN` / `TEACHER` / `STUDENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "TEACHER" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }
}

/// Guarded actions. Ownership-sensitive actions carry an `own` flag so the
/// whole permission rule set lives in one table instead of per-handler
/// if/else chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Creating a user with the given target role via `POST /users`.
    CreateUser(Role),
    DeleteUser,
    Follow,
    CreateQuestion,
    DeleteQuestion { own: bool },
    CreateExam,
    DeleteExam { own: bool },
    CreateAttempt,
}

/// The authorization rule table.
pub fn allows(role: Role, action: Action) -> bool {
    use Action::*;
    use Role::*;

    match (role, action) {
        // Admins are never creatable; teachers only by an admin; students
        // by anyone (registration itself forces the student role).
        (_, CreateUser(Admin)) => false,
        (actor, CreateUser(Teacher)) => actor == Admin,
        (_, CreateUser(Student)) => true,

        (actor, DeleteUser) => actor == Admin,

        (actor, Follow) => actor == Student,

        (actor, CreateQuestion) => actor == Teacher || actor == Admin,
        (Admin, DeleteQuestion { .. }) => true,
        (Teacher, DeleteQuestion { own }) => own,
        (Student, DeleteQuestion { .. }) => false,

        (actor, CreateExam) => actor != Student,
        (Admin, DeleteExam { .. }) => true,
        (Teacher, DeleteExam { own }) => own,
        (Student, DeleteExam { .. }) => false,

        (actor, CreateAttempt) => actor == Student,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for role in [Role::Admin, Role::Teacher, Role::Student] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn nobody_creates_admins() {
        for actor in [Role::Admin, Role::Teacher, Role::Student] {
            assert!(!allows(actor, Action::CreateUser(Role::Admin)));
        }
    }

    #[test]
    fn teacher_creation_requires_admin() {
        assert!(allows(Role::Admin, Action::CreateUser(Role::Teacher)));
        assert!(!allows(Role::Teacher, Action::CreateUser(Role::Teacher)));
        assert!(!allows(Role::Student, Action::CreateUser(Role::Teacher)));
    }

    #[test]
    fn question_deletion_is_ownership_gated_for_teachers() {
        assert!(allows(Role::Teacher, Action::DeleteQuestion { own: true }));
        assert!(!allows(Role::Teacher, Action::DeleteQuestion { own: false }));
        assert!(allows(Role::Admin, Action::DeleteQuestion { own: false }));
        assert!(!allows(Role::Student, Action::DeleteQuestion { own: true }));
    }

    #[test]
    fn students_take_exams_but_never_compose_them() {
        assert!(allows(Role::Student, Action::CreateAttempt));
        assert!(!allows(Role::Student, Action::CreateExam));
        assert!(allows(Role::Teacher, Action::CreateExam));
        assert!(!allows(Role::Teacher, Action::CreateAttempt));
    }

    #[test]
    fn only_students_follow() {
        assert!(allows(Role::Student, Action::Follow));
        assert!(!allows(Role::Teacher, Action::Follow));
        assert!(!allows(Role::Admin, Action::Follow));
    }
}
