use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use db::models::assignment::{AssignmentDetails, Language, SubmissionMethod};
use regex::Regex;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

// The id doubles as the repository folder name.
static ASSIGNMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid assignment id regex"));

/// What a teacher submits when creating or editing an assignment.
#[derive(Debug, Clone, Validate)]
pub struct AssignmentForm {
    #[validate(length(min = 1, max = 50, message = "Assignment id must have between 1 and 50 characters"))]
    pub assignment_id: String,

    #[validate(length(min = 1, max = 255, message = "Assignment name is required"))]
    pub name: String,

    pub package_name: Option<String>,
    pub language: Language,
    pub due_date: Option<DateTime<Utc>>,
    pub submission_method: SubmissionMethod,

    #[validate(length(min = 1, message = "Git repository url is required"))]
    pub git_repository_url: String,

    pub accepts_student_tests: bool,
    pub min_student_tests: Option<i32>,
    pub cooloff_period: Option<i32>,

    /// Comma separated user ids of co-owners. Left untouched on update when blank.
    pub acl: Option<String>,

    /// Comma separated author ids. Blank means the assignment is public.
    pub assignees: Option<String>,
}

impl AssignmentForm {
    /// Field checks plus the student test policy. No I/O.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate().map_err(first_field_error)?;

        if !ASSIGNMENT_ID.is_match(&self.assignment_id) {
            return Err(AppError::validation(
                "assignment_id",
                "Assignment id may only contain letters, digits, '.', '_' and '-'",
            ));
        }

        match (self.accepts_student_tests, self.min_student_tests) {
            (true, None) => Err(AppError::validation(
                "accepts_student_tests",
                "You must require at least one student test",
            )),
            (true, Some(min)) if min < 1 => Err(AppError::validation(
                "accepts_student_tests",
                "You must require at least one student test",
            )),
            (false, Some(min)) => Err(AppError::validation(
                "accepts_student_tests",
                format!("If you require {min} student tests, you must check 'Accepts student tests'"),
            )),
            _ => Ok(()),
        }
    }

    pub fn details(&self) -> AssignmentDetails {
        AssignmentDetails {
            name: self.name.trim().to_string(),
            package_name: self
                .package_name
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            language: self.language,
            due_date: self.due_date,
            submission_method: self.submission_method,
            accepts_student_tests: self.accepts_student_tests,
            min_student_tests: self.min_student_tests,
            cooloff_period: self.cooloff_period,
        }
    }

    /// `None` when the form does not mention the ACL at all.
    pub fn acl_user_ids(&self) -> Option<Vec<String>> {
        self.acl
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(split_user_ids)
    }

    pub fn assignee_ids(&self) -> Vec<String> {
        self.assignees.as_deref().map(split_user_ids).unwrap_or_default()
    }
}

fn split_user_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_field_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let message = errs
                .first()
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {field}"))
                })?;
            Some((field.to_string(), message))
        })
        .collect();
    fields.sort();

    match fields.into_iter().next() {
        Some((field, message)) => AppError::Validation { field, message },
        None => AppError::validation("form", "Invalid assignment form"),
    }
}
