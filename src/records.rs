//! Records behind the console's list views, with their backend collections and
//! filter tables.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::de;
use crate::filter::{self, FieldValue, FilterCriteria, FilterField, Filterable};
use crate::lesson_form::LessonKind;
use crate::models::Lesson;

/// A backend collection that supports list, create, update and delete.
pub trait Resource: DeserializeOwned + Serialize + Filterable + Clone + Send + 'static {
    /// Collection name in the console API.
    const NAME: &'static str;
    /// Collection path on the backend.
    const PATH: &'static str;

    /// Key used in `PUT`/`DELETE` paths.
    fn key(&self) -> Option<String>;
}

fn full_name(first: &Option<String>, last: &Option<String>) -> Option<FieldValue> {
    match (first, last) {
        (None, None) => None,
        _ => Some(FieldValue::Text(format!(
            "{} {}",
            first.as_deref().unwrap_or_default(),
            last.as_deref().unwrap_or_default()
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    #[serde(alias = "id", default, deserialize_with = "de::lenient_id")]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(rename = "TIN", default, deserialize_with = "de::lenient_string")]
    pub tin: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub study_category: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub submission_date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub approval_date: Option<NaiveDateTime>,
}

impl Filterable for Application {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Application>] = &[
            FilterField::contains("name", |a: &Application| {
                full_name(&a.first_name, &a.last_name)
            }),
            FilterField::contains("tin", |a: &Application| FieldValue::text(&a.tin)),
            FilterField::exact("status", |a: &Application| FieldValue::text(&a.status)),
            FilterField::exact("category", |a: &Application| {
                FieldValue::text(&a.study_category)
            }),
            FilterField::range("fromDate", "toDate", |a: &Application| {
                FieldValue::datetime(a.submission_date)
            }),
            FilterField::contains("firstName", |a: &Application| {
                FieldValue::text(&a.first_name)
            }),
            FilterField::contains("lastName", |a: &Application| FieldValue::text(&a.last_name)),
            FilterField::range("birthDateFrom", "birthDateTo", |a: &Application| {
                FieldValue::date(a.birth_date)
            }),
            FilterField::contains("email", |a: &Application| FieldValue::text(&a.email)),
            FilterField::contains("phone", |a: &Application| FieldValue::text(&a.phone)),
            FilterField::range("submissionDateFrom", "submissionDateTo", |a: &Application| {
                FieldValue::datetime(a.submission_date)
            }),
            FilterField::range("approvalDateFrom", "approvalDateTo", |a: &Application| {
                FieldValue::datetime(a.approval_date)
            }),
        ];
        FIELDS
    }
}

impl Resource for Application {
    const NAME: &'static str = "applications";
    const PATH: &'static str = "/api/admin/ApplicationsComponent/applications";

    fn key(&self) -> Option<String> {
        self.application_id.map(|id| id.to_string())
    }
}

pub const APPROVED: &str = "Approved";

/// Where an approved applicant is enrolled: a group for theory, an instructor
/// otherwise.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct Approval {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub instructor_id: Option<i64>,
}

/// Student record created from an approved application.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Enrollment {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tin: Option<String>,
    pub application_id: i64,
    pub group_id: Option<i64>,
    pub instructor_id: Option<i64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ApprovalError {
    #[error("Application has no id")]
    MissingId,
    #[error("Application {0} is already approved")]
    AlreadyApproved(i64),
    #[error("Please select a group for the theory application")]
    MissingGroup,
    #[error("Please select an instructor for the practice application")]
    MissingInstructor,
}

impl Application {
    pub fn is_theory(&self) -> bool {
        self.study_category
            .as_deref()
            .and_then(LessonKind::from_label)
            == Some(LessonKind::Theory)
    }

    /// The student record to create when this application is approved. Only the
    /// id matching the study category is sent.
    pub fn enrollment(&self, approval: &Approval) -> Result<Enrollment, ApprovalError> {
        let application_id = self.application_id.ok_or(ApprovalError::MissingId)?;
        if self
            .status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case(APPROVED))
        {
            return Err(ApprovalError::AlreadyApproved(application_id));
        }
        let (group_id, instructor_id) = if self.is_theory() {
            (Some(approval.group_id.ok_or(ApprovalError::MissingGroup)?), None)
        } else {
            let instructor_id = approval
                .instructor_id
                .ok_or(ApprovalError::MissingInstructor)?;
            (None, Some(instructor_id))
        };
        Ok(Enrollment {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
            email: self.email.clone(),
            phone: self.phone.clone(),
            tin: self.tin.clone(),
            application_id,
            group_id,
            instructor_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub student_id: Option<i64>,
    #[serde(rename = "TIN", default, deserialize_with = "de::lenient_string")]
    pub tin: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub exam_score: Option<f64>,
    #[serde(default)]
    pub exam_result: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub instructor_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub application_id: Option<i64>,
}

impl Filterable for Student {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Student>] = &[
            FilterField::contains("TIN", |s: &Student| FieldValue::text(&s.tin)),
            FilterField::contains("firstName", |s: &Student| FieldValue::text(&s.first_name)),
            FilterField::contains("lastName", |s: &Student| FieldValue::text(&s.last_name)),
            FilterField::range("birthDateFrom", "birthDateTo", |s: &Student| {
                FieldValue::date(s.birth_date)
            }),
            FilterField::contains("email", |s: &Student| FieldValue::text(&s.email)),
            FilterField::contains("phone", |s: &Student| FieldValue::text(&s.phone)),
            FilterField::exact("group", |s: &Student| FieldValue::int(s.group_id)),
            FilterField::exact("instructor", |s: &Student| FieldValue::int(s.instructor_id)),
            FilterField::range("examScoreFrom", "examScoreTo", |s: &Student| {
                FieldValue::float(s.exam_score)
            }),
            FilterField::contains("examResult", |s: &Student| {
                FieldValue::text(&s.exam_result)
            }),
        ];
        FIELDS
    }
}

impl Resource for Student {
    const NAME: &'static str = "students";
    const PATH: &'static str = "/api/admin/StudentsComponent/students";

    fn key(&self) -> Option<String> {
        self.tin.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instructor {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub instructor_id: Option<i64>,
    #[serde(rename = "TIN", default, deserialize_with = "de::lenient_string")]
    pub tin: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub experience_years: Option<i64>,
    #[serde(default)]
    pub driving_category: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_id: Option<i64>,
    #[serde(default)]
    pub login: Option<String>,
}

impl Filterable for Instructor {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Instructor>] = &[
            FilterField::contains("login", |i: &Instructor| FieldValue::text(&i.login)),
            FilterField::contains("tin", |i: &Instructor| FieldValue::text(&i.tin)),
            FilterField::contains("firstName", |i: &Instructor| {
                FieldValue::text(&i.first_name)
            }),
            FilterField::contains("lastName", |i: &Instructor| FieldValue::text(&i.last_name)),
            FilterField::exact("drivingCategory", |i: &Instructor| {
                FieldValue::text(&i.driving_category)
            }),
            FilterField::range("experienceFrom", "experienceTo", |i: &Instructor| {
                FieldValue::int(i.experience_years)
            }),
            FilterField::exact("carId", |i: &Instructor| FieldValue::int(i.car_id)),
            FilterField::range("birthDateFrom", "birthDateTo", |i: &Instructor| {
                FieldValue::date(i.birth_date)
            }),
            FilterField::contains("email", |i: &Instructor| FieldValue::text(&i.email)),
            FilterField::contains("phone", |i: &Instructor| FieldValue::text(&i.phone)),
        ];
        FIELDS
    }
}

impl Resource for Instructor {
    const NAME: &'static str = "instructors";
    const PATH: &'static str = "/api/admin/InstructorsComponent/instructors";

    fn key(&self) -> Option<String> {
        self.tin.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Teacher {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub teacher_id: Option<i64>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(rename = "TIN", default, deserialize_with = "de::lenient_string")]
    pub tin: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Filterable for Teacher {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Teacher>] = &[
            FilterField::contains("TIN", |t: &Teacher| FieldValue::text(&t.tin)),
            FilterField::contains("firstName", |t: &Teacher| FieldValue::text(&t.first_name)),
            FilterField::contains("lastName", |t: &Teacher| FieldValue::text(&t.last_name)),
            FilterField::contains("email", |t: &Teacher| FieldValue::text(&t.email)),
            FilterField::range("birthDateFrom", "birthDateTo", |t: &Teacher| {
                FieldValue::date(t.birth_date)
            }),
            FilterField::contains("phone", |t: &Teacher| FieldValue::text(&t.phone)),
            FilterField::contains("login", |t: &Teacher| FieldValue::text(&t.login)),
        ];
        FIELDS
    }
}

impl Resource for Teacher {
    const NAME: &'static str = "teachers";
    const PATH: &'static str = "/api/admin/TeachersComponent/teachers";

    fn key(&self) -> Option<String> {
        self.teacher_id.map(|id| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub teacher_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub current_students: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Filterable for Group {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Group>] = &[
            FilterField::contains("name", |g: &Group| FieldValue::text(&g.name)),
            FilterField::contains("currentStudents", |g: &Group| {
                FieldValue::int(g.current_students)
            }),
            FilterField::exact("teacherId", |g: &Group| FieldValue::int(g.teacher_id)),
        ];
        FIELDS
    }
}

impl Resource for Group {
    const NAME: &'static str = "groups";
    const PATH: &'static str = "/api/admin/groups";

    fn key(&self) -> Option<String> {
        self.group_id.map(|id| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classroom {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub classroom_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl Filterable for Classroom {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Classroom>] = &[
            FilterField::contains("name", |c: &Classroom| FieldValue::text(&c.name)),
            FilterField::exact("is_available", |c: &Classroom| {
                c.is_available.map(FieldValue::Bool)
            }),
        ];
        FIELDS
    }
}

impl Resource for Classroom {
    const NAME: &'static str = "classrooms";
    const PATH: &'static str = "/api/admin/classrooms";

    fn key(&self) -> Option<String> {
        self.classroom_id.map(|id| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exam {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub exam_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(rename = "type", default)]
    pub exam_type: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub instructor_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub teacher_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub exam_location_id: Option<i64>,
    #[serde(default)]
    pub examiner_name: Option<String>,
    #[serde(default)]
    pub examiner_role: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub classroom_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_id: Option<i64>,
    #[serde(default)]
    pub classroom_name: Option<String>,
    #[serde(default)]
    pub car_info: Option<String>,
}

impl Filterable for Exam {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Exam>] = &[
            FilterField::range("fromDate", "toDate", |e: &Exam| {
                FieldValue::datetime(e.start_time)
            }),
            FilterField::exact("type", |e: &Exam| FieldValue::text(&e.exam_type)),
            // an exam has either an instructor or a teacher as examiner
            FilterField::exact("examinerId", |e: &Exam| {
                FieldValue::int(e.instructor_id.or(e.teacher_id))
            }),
            FilterField::exact("locationId", |e: &Exam| {
                FieldValue::int(e.classroom_id.or(e.car_id))
            }),
        ];
        FIELDS
    }
}

impl Resource for Exam {
    const NAME: &'static str = "exams";
    const PATH: &'static str = "/api/admin/exams";

    fn key(&self) -> Option<String> {
        self.exam_id.map(|id| id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Car {
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_model_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_condition_id: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub year_of_manufacture: Option<i64>,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub car_model_name: Option<String>,
    #[serde(default)]
    pub car_brand_name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_id")]
    pub car_brand_id: Option<i64>,
    #[serde(default)]
    pub car_category_name: Option<String>,
    #[serde(default)]
    pub car_condition: Option<String>,
}

impl Filterable for Car {
    fn filter_fields() -> &'static [FilterField<Self>] {
        const FIELDS: &[FilterField<Car>] = &[
            FilterField::contains("car_brand", |c: &Car| FieldValue::text(&c.car_brand_name)),
            FilterField::contains("car_model", |c: &Car| FieldValue::text(&c.car_model_name)),
            FilterField::contains("licensePlate", |c: &Car| FieldValue::text(&c.license_plate)),
            FilterField::exact("car_category", |c: &Car| {
                FieldValue::text(&c.car_category_name)
            }),
            FilterField::exact("car_condition", |c: &Car| FieldValue::text(&c.car_condition)),
            FilterField::range("yearFrom", "yearTo", |c: &Car| {
                FieldValue::int(c.year_of_manufacture)
            }),
        ];
        FIELDS
    }
}

impl Resource for Car {
    const NAME: &'static str = "cars";
    const PATH: &'static str = "/api/admin/cars";

    fn key(&self) -> Option<String> {
        self.car_id.map(|id| id.to_string())
    }
}

impl Resource for Lesson {
    const NAME: &'static str = "lessons";
    const PATH: &'static str = "/api/admin/lessons";

    fn key(&self) -> Option<String> {
        Some(self.lesson_id.to_string())
    }
}

/// Collection names served under `/records/{collection}`.
pub const COLLECTIONS: [&str; 8] = [
    Application::NAME,
    Student::NAME,
    Instructor::NAME,
    Teacher::NAME,
    Group::NAME,
    Classroom::NAME,
    Exam::NAME,
    Car::NAME,
];

/// Keeps the backend rows whose typed view of `R` satisfies `criteria`. Rows
/// are returned as received, including columns `R` does not model.
pub fn filter_rows<R: Resource>(
    rows: Vec<Value>,
    criteria: &FilterCriteria,
) -> Result<Vec<Value>, serde_json::Error> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let record = R::deserialize(&row)?;
        if filter::matches(&record, criteria) {
            kept.push(row);
        }
    }
    Ok(kept)
}

/// A `/records/{collection}` path segment resolved to its record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Applications,
    Students,
    Instructors,
    Teachers,
    Groups,
    Classrooms,
    Exams,
    Cars,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Applications,
        Collection::Students,
        Collection::Instructors,
        Collection::Teachers,
        Collection::Groups,
        Collection::Classrooms,
        Collection::Exams,
        Collection::Cars,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Applications => Application::NAME,
            Collection::Students => Student::NAME,
            Collection::Instructors => Instructor::NAME,
            Collection::Teachers => Teacher::NAME,
            Collection::Groups => Group::NAME,
            Collection::Classrooms => Classroom::NAME,
            Collection::Exams => Exam::NAME,
            Collection::Cars => Car::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::filter::{FilterCriteria, apply};

    fn criteria(pairs: &[(&str, &str)]) -> FilterCriteria {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_student_first_name_substring() {
        let students: Vec<Student> = serde_json::from_value(json!([
            {"first_name": "Anna", "TIN": "1111111111"},
            {"first_name": "Bob", "TIN": "2222222222"}
        ]))
        .unwrap();
        let result = apply(&students, &criteria(&[("firstName", "an")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].first_name.as_deref(), Some("Anna"));
        assert_eq!(result[0].key().as_deref(), Some("1111111111"));
    }

    #[test]
    fn test_student_group_id_coerced_from_string() {
        let students: Vec<Student> = serde_json::from_value(json!([
            {"first_name": "Anna", "group_id": "3", "exam_score": "81.5"},
            {"first_name": "Bob", "group_id": 4, "exam_score": null}
        ]))
        .unwrap();
        let result = apply(&students, &criteria(&[("group", "3")]));
        assert_eq!(result.len(), 1);
        let result = apply(&students, &criteria(&[("examScoreFrom", "50")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].first_name.as_deref(), Some("Anna"));
    }

    #[test]
    fn test_application_submission_range() {
        let apps: Vec<Application> = serde_json::from_value(json!([
            {"application_id": 1, "first_name": "Ira", "last_name": "Koval", "submission_date": "2024-03-01T16:45:00"},
            {"application_id": 2, "first_name": "Oleh", "last_name": "Bondar", "submission_date": "2024-03-02T08:00:00"},
            {"application_id": 3, "first_name": "Nina", "last_name": "Koval"}
        ]))
        .unwrap();
        let result = apply(&apps, &criteria(&[("toDate", "2024-03-01")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].application_id, Some(1));

        let result = apply(&apps, &criteria(&[("name", "a koval")]));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_classroom_availability_flag() {
        let rooms: Vec<Classroom> = serde_json::from_value(json!([
            {"classroom_id": 1, "name": "A-101", "is_available": true},
            {"classroom_id": 2, "name": "A-102", "is_available": false},
            {"classroom_id": 3, "name": "B-201"}
        ]))
        .unwrap();
        let result = apply(&rooms, &criteria(&[("is_available", "true")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].key().as_deref(), Some("1"));
    }

    #[test]
    fn test_exam_examiner_matches_either_role() {
        let exams: Vec<Exam> = serde_json::from_value(json!([
            {"exam_id": 1, "type": "Theory", "teacher_id": 7, "classroom_id": 2},
            {"exam_id": 2, "type": "Practice", "instructor_id": 7, "car_id": 5},
            {"exam_id": 3, "type": "Practice", "instructor_id": 8, "car_id": 7}
        ]))
        .unwrap();
        let result = apply(&exams, &criteria(&[("examinerId", "7")]));
        assert_eq!(result.len(), 2);
        let result = apply(&exams, &criteria(&[("type", "practice"), ("locationId", "7")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].exam_id, Some(3));
    }

    #[test]
    fn test_car_year_range_and_plate() {
        let cars: Vec<Car> = serde_json::from_value(json!([
            {"car_id": 1, "license_plate": "AA1234BB", "year_of_manufacture": 2015},
            {"car_id": 2, "license_plate": "BC7777KA", "year_of_manufacture": 2021}
        ]))
        .unwrap();
        assert_eq!(apply(&cars, &criteria(&[("yearFrom", "2018")])).len(), 1);
        assert_eq!(apply(&cars, &criteria(&[("licensePlate", "bc77")])).len(), 1);
    }

    #[test]
    fn test_collections_are_unique() {
        let mut names = COLLECTIONS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), COLLECTIONS.len());
    }

    #[test]
    fn test_collection_lookup() {
        for name in COLLECTIONS {
            assert_eq!(Collection::from_name(name).map(Collection::name), Some(name));
        }
        assert_eq!(Collection::from_name("lessons"), None);
    }

    #[test]
    fn test_filter_rows_keeps_unmodelled_columns() {
        let rows = vec![
            json!({"TIN": "1111111111", "first_name": "Anna", "exam_result_id": 5, "group_name": "B-12"}),
            json!({"TIN": "2222222222", "first_name": "Bob"}),
        ];
        let kept = filter_rows::<Student>(rows, &criteria(&[("firstName", "ann")])).unwrap();
        assert_eq!(
            kept,
            vec![json!({"TIN": "1111111111", "first_name": "Anna", "exam_result_id": 5, "group_name": "B-12"})]
        );
    }

    #[test]
    fn test_filter_rows_without_criteria_returns_everything() {
        let rows = vec![json!({"car_id": 1}), json!({"car_id": 2, "mileage": 120000})];
        let kept = filter_rows::<Car>(rows.clone(), &FilterCriteria::new()).unwrap();
        assert_eq!(kept, rows);
    }

    #[test]
    fn test_filter_rows_rejects_malformed_row() {
        let rows = vec![json!("AA1234BB")];
        assert!(filter_rows::<Car>(rows, &FilterCriteria::new()).is_err());
    }

    fn application(category: &str, status: &str) -> Application {
        serde_json::from_value(json!({
            "id": 11,
            "first_name": "Ira",
            "last_name": "Koval",
            "TIN": 3333333333u64,
            "birth_date": "2001-04-02",
            "study_category": category,
            "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_theory_enrollment_needs_group() {
        let app = application("Theory", "Pending");
        assert_eq!(app.key().as_deref(), Some("11"));
        assert_eq!(
            app.enrollment(&Approval::default()),
            Err(ApprovalError::MissingGroup)
        );
        let enrollment = app
            .enrollment(&Approval {
                group_id: Some(4),
                instructor_id: Some(3),
            })
            .unwrap();
        assert_eq!(enrollment.application_id, 11);
        assert_eq!(enrollment.group_id, Some(4));
        assert_eq!(enrollment.instructor_id, None);
        assert_eq!(enrollment.tin.as_deref(), Some("3333333333"));
    }

    #[test]
    fn test_practice_enrollment_needs_instructor() {
        let app = application("Practice", "Pending");
        assert_eq!(
            app.enrollment(&Approval {
                group_id: Some(4),
                instructor_id: None,
            }),
            Err(ApprovalError::MissingInstructor)
        );
        let enrollment = app
            .enrollment(&Approval {
                group_id: Some(4),
                instructor_id: Some(3),
            })
            .unwrap();
        assert_eq!((enrollment.group_id, enrollment.instructor_id), (None, Some(3)));
    }

    #[test]
    fn test_approved_application_not_enrolled_twice() {
        let app = application("Theory", "approved");
        assert_eq!(
            app.enrollment(&Approval {
                group_id: Some(4),
                instructor_id: None,
            }),
            Err(ApprovalError::AlreadyApproved(11))
        );
    }
}
