//! Lesson add/edit form: lesson-type branching, validation and the payload
//! sent to the backend.
//!
//! A lesson is either a theory lesson (a group in a classroom) or a practice
//! lesson (an instructor with one student). The kind is resolved from the
//! lesson-type label when the reference tables are loaded and carried as a
//! [`LessonKind`] from then on.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::de;
use crate::models::{Lesson, ReferenceTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    Theory,
    Practice,
}

impl LessonKind {
    /// Resolves the kind from a free-text lesson-type label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.contains("theory") || label.contains("теорія") {
            Some(LessonKind::Theory)
        } else if label.contains("practical") || label.contains("practice") {
            Some(LessonKind::Practice)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonKind::Theory => "theory",
            LessonKind::Practice => "practice",
        }
    }
}

impl std::fmt::Display for LessonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of the form is active for the selected lesson type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormBranch {
    Unselected,
    Theory,
    Practice,
    Unrecognized(String),
}

impl FormBranch {
    pub fn name(&self) -> &'static str {
        match self {
            FormBranch::Unselected => "unselected",
            FormBranch::Theory => "theory",
            FormBranch::Practice => "practice",
            FormBranch::Unrecognized(_) => "unrecognized",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("Please select a lesson type")]
    MissingLessonType,
    #[error("Lesson type {0} was not found")]
    UnknownLessonType(i64),
    #[error("Unknown lesson type: {0}")]
    UnrecognizedLessonType(String),
    #[error("Please select a {field} for the {kind} lesson")]
    MissingField {
        field: &'static str,
        kind: LessonKind,
    },
    #[error("{0} time is required")]
    MissingTime(&'static str),
    #[error("{field} time '{value}' is not a valid HH:MM time")]
    InvalidTime { field: &'static str, value: String },
    #[error("End time must be after start time")]
    EndNotAfterStart,
}

/// Editable state of the lesson form. Times are `HH:MM` (or `HH:MM:SS`) strings
/// combined with the resolved calendar date on submit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LessonForm {
    #[serde(default)]
    #[schema(example = "09:00")]
    pub start_time: String,
    #[serde(default)]
    #[schema(example = "10:30")]
    pub end_time: String,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub lesson_type_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub lesson_status_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub lesson_topic_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub classroom_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub instructor_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub student_id: Option<i64>,
}

/// Body of a lesson create or update. Ids of the inactive branch are sent as
/// explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LessonPayload {
    pub lesson_type_id: i64,
    pub lesson_status_id: Option<i64>,
    pub lesson_topic_id: Option<i64>,
    #[schema(value_type = String, format = DateTime, example = "2024-05-10T09:00:00")]
    pub start_time: NaiveDateTime,
    #[schema(value_type = String, format = DateTime, example = "2024-05-10T10:30:00")]
    pub end_time: NaiveDateTime,
    pub classroom_id: Option<i64>,
    pub group_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub student_id: Option<i64>,
}

fn parse_time(field: &'static str, raw: &str) -> Result<NaiveTime, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FormError::MissingTime(field));
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| FormError::InvalidTime {
            field,
            value: raw.to_string(),
        })
}

fn require(
    value: Option<i64>,
    field: &'static str,
    kind: LessonKind,
) -> Result<i64, FormError> {
    value.ok_or(FormError::MissingField { field, kind })
}

impl LessonForm {
    /// Add-mode defaults: theory preselected, the "not conducted" status when the
    /// table has one, and both times set to `now`.
    pub fn blank(refs: &ReferenceTables, now: NaiveTime) -> Self {
        let time = now.format("%H:%M").to_string();
        Self {
            start_time: time.clone(),
            end_time: time,
            lesson_type_id: refs
                .first_of_kind(LessonKind::Theory)
                .map(|t| t.lesson_type_id),
            lesson_status_id: refs.default_status().map(|s| s.lesson_status_id),
            ..Self::default()
        }
    }

    pub fn from_lesson(lesson: &Lesson) -> Self {
        let hhmm = |ts: Option<NaiveDateTime>| {
            ts.map(|ts| ts.format("%H:%M").to_string())
                .unwrap_or_default()
        };
        Self {
            start_time: hhmm(lesson.start_time),
            end_time: hhmm(lesson.end_time),
            lesson_type_id: lesson.lesson_type_id,
            lesson_status_id: lesson.lesson_status_id,
            lesson_topic_id: lesson.lesson_topic_id,
            classroom_id: lesson.classroom_id,
            group_id: lesson.group_id,
            instructor_id: lesson.instructor_id,
            student_id: lesson.student_id,
        }
    }

    pub fn branch(&self, refs: &ReferenceTables) -> FormBranch {
        let Some(id) = self.lesson_type_id else {
            return FormBranch::Unselected;
        };
        match refs.lesson_type(id) {
            Some(t) => match t.kind {
                Some(LessonKind::Theory) => FormBranch::Theory,
                Some(LessonKind::Practice) => FormBranch::Practice,
                None => FormBranch::Unrecognized(t.label.clone()),
            },
            None => FormBranch::Unrecognized(id.to_string()),
        }
    }

    /// Switches the lesson type, clearing the fields of the branch that is no
    /// longer active.
    pub fn select_lesson_type(&mut self, lesson_type_id: Option<i64>, refs: &ReferenceTables) {
        self.lesson_type_id = lesson_type_id;
        if self.branch(refs) == FormBranch::Theory {
            self.instructor_id = None;
            self.student_id = None;
        } else {
            self.group_id = None;
            self.classroom_id = None;
        }
    }

    /// Validates the form and builds the backend payload for `date`.
    pub fn submission(
        &self,
        refs: &ReferenceTables,
        date: NaiveDate,
    ) -> Result<LessonPayload, FormError> {
        let lesson_type_id = self.lesson_type_id.ok_or(FormError::MissingLessonType)?;
        let lesson_type = refs
            .lesson_type(lesson_type_id)
            .ok_or(FormError::UnknownLessonType(lesson_type_id))?;
        let kind = lesson_type
            .kind
            .ok_or_else(|| FormError::UnrecognizedLessonType(lesson_type.label.clone()))?;

        let (classroom_id, group_id, instructor_id, student_id) = match kind {
            LessonKind::Theory => {
                let group = require(self.group_id, "group", kind)?;
                let classroom = require(self.classroom_id, "classroom", kind)?;
                (Some(classroom), Some(group), None, None)
            }
            LessonKind::Practice => {
                let instructor = require(self.instructor_id, "instructor", kind)?;
                let student = require(self.student_id, "student", kind)?;
                (None, None, Some(instructor), Some(student))
            }
        };

        let start_time = date.and_time(parse_time("Start", &self.start_time)?);
        let end_time = date.and_time(parse_time("End", &self.end_time)?);
        if end_time <= start_time {
            return Err(FormError::EndNotAfterStart);
        }

        Ok(LessonPayload {
            lesson_type_id,
            lesson_status_id: self.lesson_status_id,
            lesson_topic_id: self.lesson_topic_id,
            start_time,
            end_time,
            classroom_id,
            group_id,
            instructor_id,
            student_id,
        })
    }
}

/// Date a submitted form is scheduled on: the edited lesson's day, then the
/// clicked calendar cell, then today.
pub fn resolve_date(
    editing: Option<&Lesson>,
    clicked: Option<NaiveDate>,
    today: NaiveDate,
) -> NaiveDate {
    editing
        .and_then(|lesson| lesson.start_time)
        .map(|start| start.date())
        .or(clicked)
        .unwrap_or(today)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    Add,
    Edit,
}

/// Form as presented to the console: its values plus the derived state.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormView {
    pub mode: FormMode,
    pub lesson_id: Option<i64>,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    /// One of `unselected`, `theory`, `practice`, `unrecognized`.
    pub branch: String,
    pub unrecognized_type: Option<String>,
    pub form: LessonForm,
}

impl FormView {
    pub fn new(
        mode: FormMode,
        lesson_id: Option<i64>,
        date: NaiveDate,
        form: LessonForm,
        refs: &ReferenceTables,
    ) -> Self {
        let branch = form.branch(refs);
        let unrecognized_type = match &branch {
            FormBranch::Unrecognized(label) => Some(label.clone()),
            _ => None,
        };
        Self {
            mode,
            lesson_id,
            date,
            branch: branch.name().to_string(),
            unrecognized_type,
            form,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonStatus, LessonTypeRow};

    fn refs() -> ReferenceTables {
        ReferenceTables {
            types: vec![
                LessonTypeRow {
                    lesson_type_id: 1,
                    lesson_type: "Теорія".into(),
                }
                .into(),
                LessonTypeRow {
                    lesson_type_id: 2,
                    lesson_type: "Practical driving".into(),
                }
                .into(),
                LessonTypeRow {
                    lesson_type_id: 3,
                    lesson_type: "Exam prep".into(),
                }
                .into(),
            ],
            statuses: vec![
                LessonStatus {
                    lesson_status_id: 1,
                    lesson_status: "Conducted".into(),
                },
                LessonStatus {
                    lesson_status_id: 2,
                    lesson_status: "Не проведено".into(),
                },
            ],
            topics: vec![],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn theory_form() -> LessonForm {
        LessonForm {
            start_time: "09:00".into(),
            end_time: "10:30".into(),
            lesson_type_id: Some(1),
            lesson_status_id: Some(2),
            group_id: Some(4),
            classroom_id: Some(7),
            ..LessonForm::default()
        }
    }

    #[test]
    fn test_kind_from_label() {
        assert_eq!(LessonKind::from_label("Theory"), Some(LessonKind::Theory));
        assert_eq!(LessonKind::from_label("Теорія"), Some(LessonKind::Theory));
        assert_eq!(
            LessonKind::from_label(" PRACTICAL "),
            Some(LessonKind::Practice)
        );
        assert_eq!(LessonKind::from_label("practice"), Some(LessonKind::Practice));
        assert_eq!(LessonKind::from_label("Exam prep"), None);
    }

    #[test]
    fn test_ukrainian_theory_requires_group() {
        let form = LessonForm {
            group_id: None,
            ..theory_form()
        };
        assert_eq!(form.branch(&refs()), FormBranch::Theory);
        let err = form.submission(&refs(), date(2024, 5, 10)).unwrap_err();
        assert!(err.to_string().contains("group"));
        assert_eq!(
            err,
            FormError::MissingField {
                field: "group",
                kind: LessonKind::Theory
            }
        );
    }

    #[test]
    fn test_theory_submission_nulls_practice_fields() {
        let mut form = theory_form();
        form.instructor_id = Some(3);
        let payload = form.submission(&refs(), date(2024, 5, 10)).unwrap();
        assert_eq!(payload.group_id, Some(4));
        assert_eq!(payload.classroom_id, Some(7));
        assert_eq!(payload.instructor_id, None);
        assert_eq!(payload.student_id, None);
        assert_eq!(
            payload.start_time,
            date(2024, 5, 10).and_hms_opt(9, 0, 0).unwrap()
        );

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["start_time"], "2024-05-10T09:00:00");
        assert!(body["instructor_id"].is_null());
    }

    #[test]
    fn test_practice_requires_instructor_then_student() {
        let refs = refs();
        let mut form = theory_form();
        form.select_lesson_type(Some(2), &refs);
        assert_eq!(form.group_id, None);
        assert_eq!(form.classroom_id, None);
        let err = form.submission(&refs, date(2024, 5, 10)).unwrap_err();
        assert!(err.to_string().contains("instructor"));

        form.instructor_id = Some(3);
        let err = form.submission(&refs, date(2024, 5, 10)).unwrap_err();
        assert!(err.to_string().contains("student"));

        form.student_id = Some(9);
        let payload = form.submission(&refs, date(2024, 5, 10)).unwrap();
        assert_eq!(payload.instructor_id, Some(3));
        assert_eq!(payload.group_id, None);
    }

    #[test]
    fn test_unrecognized_type_is_named() {
        let mut form = theory_form();
        form.lesson_type_id = Some(3);
        assert_eq!(
            form.branch(&refs()),
            FormBranch::Unrecognized("Exam prep".into())
        );
        let err = form.submission(&refs(), date(2024, 5, 10)).unwrap_err();
        assert_eq!(err.to_string(), "Unknown lesson type: Exam prep");
    }

    #[test]
    fn test_missing_and_unknown_type() {
        let mut form = theory_form();
        form.lesson_type_id = None;
        assert_eq!(
            form.submission(&refs(), date(2024, 5, 10)),
            Err(FormError::MissingLessonType)
        );
        form.lesson_type_id = Some(42);
        assert_eq!(
            form.submission(&refs(), date(2024, 5, 10)),
            Err(FormError::UnknownLessonType(42))
        );
    }

    #[test]
    fn test_time_validation() {
        let refs = refs();
        let day = date(2024, 5, 10);

        let form = LessonForm {
            start_time: "".into(),
            ..theory_form()
        };
        assert_eq!(
            form.submission(&refs, day),
            Err(FormError::MissingTime("Start"))
        );

        let form = LessonForm {
            end_time: "25:99".into(),
            ..theory_form()
        };
        assert!(matches!(
            form.submission(&refs, day),
            Err(FormError::InvalidTime { field: "End", .. })
        ));

        let form = LessonForm {
            end_time: "09:00".into(),
            ..theory_form()
        };
        assert_eq!(
            form.submission(&refs, day),
            Err(FormError::EndNotAfterStart)
        );

        let form = LessonForm {
            start_time: "09:00:00".into(),
            end_time: "09:00:01".into(),
            ..theory_form()
        };
        assert!(form.submission(&refs, day).is_ok());
    }

    #[test]
    fn test_branch_fields_never_both_populated() {
        let refs = refs();
        let mut form = LessonForm {
            group_id: Some(1),
            classroom_id: Some(2),
            instructor_id: Some(3),
            student_id: Some(4),
            ..LessonForm::default()
        };
        let sequence = [Some(1), Some(2), None, Some(3), Some(1), Some(99), Some(2)];
        for id in sequence {
            form.select_lesson_type(id, &refs);
            let theory_set = form.group_id.is_some() || form.classroom_id.is_some();
            let practice_set = form.instructor_id.is_some() || form.student_id.is_some();
            assert!(!(theory_set && practice_set), "both branches set after {id:?}");
        }
    }

    #[test]
    fn test_select_keeps_active_branch_fields() {
        let refs = refs();
        let mut form = theory_form();
        form.select_lesson_type(Some(1), &refs);
        assert_eq!(form.group_id, Some(4));
        assert_eq!(form.classroom_id, Some(7));
    }

    #[test]
    fn test_blank_form_defaults() {
        let now = NaiveTime::from_hms_opt(14, 5, 33).unwrap();
        let form = LessonForm::blank(&refs(), now);
        assert_eq!(form.start_time, "14:05");
        assert_eq!(form.end_time, "14:05");
        assert_eq!(form.lesson_type_id, Some(1));
        assert_eq!(form.lesson_status_id, Some(2));

        let empty = LessonForm::blank(&ReferenceTables::default(), now);
        assert_eq!(empty.lesson_type_id, None);
        assert_eq!(empty.lesson_status_id, None);
    }

    #[test]
    fn test_form_from_lesson() {
        let lesson: Lesson = serde_json::from_value(serde_json::json!({
            "lesson_id": 8,
            "start_time": "2024-05-10T09:15:00",
            "end_time": "2024-05-10T10:45:00",
            "lesson_type_id": 2,
            "instructor_id": 3,
            "student_id": "9"
        }))
        .unwrap();
        let form = LessonForm::from_lesson(&lesson);
        assert_eq!(form.start_time, "09:15");
        assert_eq!(form.end_time, "10:45");
        assert_eq!(form.student_id, Some(9));
        assert_eq!(form.branch(&refs()), FormBranch::Practice);
    }

    #[test]
    fn test_resolve_date_priority() {
        let lesson: Lesson = serde_json::from_value(serde_json::json!({
            "lesson_id": 8,
            "start_time": "2024-05-10T09:15:00"
        }))
        .unwrap();
        let clicked = Some(date(2024, 6, 1));
        let today = date(2024, 7, 1);
        assert_eq!(resolve_date(Some(&lesson), clicked, today), date(2024, 5, 10));
        assert_eq!(resolve_date(None, clicked, today), date(2024, 6, 1));
        assert_eq!(resolve_date(None, None, today), today);
    }

    #[test]
    fn test_form_view_reports_unrecognized_label() {
        let form = LessonForm {
            lesson_type_id: Some(3),
            ..LessonForm::default()
        };
        let view = FormView::new(FormMode::Add, None, date(2024, 5, 10), form, &refs());
        assert_eq!(view.branch, "unrecognized");
        assert_eq!(view.unrecognized_type.as_deref(), Some("Exam prep"));
    }
}
