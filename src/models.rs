use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::de;
use crate::filter::{FieldValue, FilterField, Filterable};
use crate::lesson_form::LessonKind;
use crate::session::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Lesson {
    #[serde(deserialize_with = "de::strict_id")]
    pub lesson_id: i64,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-05-10T09:00:00")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-05-10T10:30:00")]
    pub end_time: Option<NaiveDateTime>,
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
    #[serde(default)]
    pub lesson_type: Option<String>,
    #[serde(default)]
    pub lesson_status: Option<String>,
    #[serde(default)]
    pub lesson_topic: Option<String>,
    #[serde(default)]
    pub classroom_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub instructor_name: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
}

impl Lesson {
    pub fn kind(&self) -> Option<LessonKind> {
        self.lesson_type.as_deref().and_then(LessonKind::from_label)
    }
}

impl Filterable for Lesson {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Lesson>] = &[
            // a partial value such as `2024-05` selects the whole month
            FilterField::contains("startDate", |l: &Lesson| FieldValue::datetime(l.start_time)),
            FilterField::exact("groupId", |l: &Lesson| FieldValue::int(l.group_id)),
            FilterField::exact("type", |l: &Lesson| {
                l.kind().map(|kind| FieldValue::Text(kind.as_str().to_string()))
            }),
            FilterField::exact("instructorId", |l: &Lesson| FieldValue::int(l.instructor_id)),
            FilterField::exact("status", |l: &Lesson| FieldValue::text(&l.lesson_status)),
            FilterField::exact("classroom", |l: &Lesson| FieldValue::text(&l.classroom_name)),
        ];
        FIELDS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LessonTypeRow {
    #[serde(deserialize_with = "de::strict_id")]
    pub lesson_type_id: i64,
    pub lesson_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LessonStatus {
    #[serde(deserialize_with = "de::strict_id")]
    pub lesson_status_id: i64,
    pub lesson_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LessonTopic {
    #[serde(deserialize_with = "de::strict_id")]
    pub lesson_topic_id: i64,
    pub lesson_topic: String,
}

/// A lesson type with its kind resolved once, when the table is loaded.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct LessonType {
    pub lesson_type_id: i64,
    pub label: String,
    pub kind: Option<LessonKind>,
}

impl From<LessonTypeRow> for LessonType {
    fn from(row: LessonTypeRow) -> Self {
        Self {
            kind: LessonKind::from_label(&row.lesson_type),
            lesson_type_id: row.lesson_type_id,
            label: row.lesson_type,
        }
    }
}

const NOT_AVAILABLE: &str = "N/A";

const DEFAULT_STATUS_LABELS: [&str; 3] = ["not conducted", "не проведено", "scheduled"];

#[derive(Debug, Clone, Default, Serialize, PartialEq, ToSchema)]
pub struct ReferenceTables {
    pub types: Vec<LessonType>,
    pub statuses: Vec<LessonStatus>,
    pub topics: Vec<LessonTopic>,
}

impl ReferenceTables {
    pub fn lesson_type(&self, id: i64) -> Option<&LessonType> {
        self.types.iter().find(|t| t.lesson_type_id == id)
    }

    pub fn type_label(&self, id: Option<i64>) -> &str {
        id.and_then(|id| self.lesson_type(id))
            .map(|t| t.label.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn status_label(&self, id: Option<i64>) -> &str {
        id.and_then(|id| self.statuses.iter().find(|s| s.lesson_status_id == id))
            .map(|s| s.lesson_status.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn topic_label(&self, id: Option<i64>) -> &str {
        id.and_then(|id| self.topics.iter().find(|t| t.lesson_topic_id == id))
            .map(|t| t.lesson_topic.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Kind of the lesson's type, falling back to the joined label.
    pub fn kind_of(&self, lesson: &Lesson) -> Option<LessonKind> {
        lesson
            .lesson_type_id
            .and_then(|id| self.lesson_type(id))
            .and_then(|t| t.kind)
            .or_else(|| lesson.kind())
    }

    pub fn first_of_kind(&self, kind: LessonKind) -> Option<&LessonType> {
        self.types.iter().find(|t| t.kind == Some(kind))
    }

    pub fn default_status(&self) -> Option<&LessonStatus> {
        self.statuses.iter().find(|s| {
            let label = s.lesson_status.trim().to_lowercase();
            DEFAULT_STATUS_LABELS.contains(&label.as_str())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LoginUser {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginEnvelope {
    pub user: LoginUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status_id: i64,
}

/// New exam score for a student on the caller's roster. `null` clears it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamScore {
    #[serde(default)]
    #[schema(example = 87.5)]
    pub exam_score: Option<f64>,
}

impl ExamScore {
    pub const MAX: f64 = 100.0;

    pub fn is_valid(&self) -> bool {
        self.exam_score
            .is_none_or(|score| score.is_finite() && (0.0..=Self::MAX).contains(&score))
    }
}

/// Window for the instructor's exam list. Every bound is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamPeriod {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub kind: Option<LessonKind>,
}

impl ExamPeriod {
    pub fn is_ordered(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    /// Backend query parameters, in `start_date`, `end_date`, `type` order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let day = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        let mut pairs = Vec::new();
        if let Some(start) = self.start_date {
            pairs.push(("start_date", day(start)));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", day(end)));
        }
        if let Some(kind) = self.kind {
            pairs.push(("type", kind.as_str().to_string()));
        }
        pairs
    }
}
