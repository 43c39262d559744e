use chrono::Duration;
use icalendar::{Calendar, Component, Event, EventLike};

use crate::lesson_form::LessonKind;
use crate::models::{Lesson, ReferenceTables};

#[derive(Clone)]
pub struct ScheduleExporter {
    calendar_name: String,
}

impl ScheduleExporter {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
        }
    }

    fn event(&self, lesson: &Lesson, refs: &ReferenceTables) -> Option<Event> {
        let start = lesson.start_time?;
        let end = lesson
            .end_time
            .filter(|end| *end > start)
            .unwrap_or(start + Duration::hours(1));

        let type_label = lesson
            .lesson_type
            .as_deref()
            .unwrap_or_else(|| refs.type_label(lesson.lesson_type_id));
        let topic = lesson
            .lesson_topic
            .as_deref()
            .unwrap_or_else(|| refs.topic_label(lesson.lesson_topic_id));
        let status = lesson
            .lesson_status
            .as_deref()
            .unwrap_or_else(|| refs.status_label(lesson.lesson_status_id));

        let mut description = vec![format!("Status: {status}")];
        match refs.kind_of(lesson) {
            Some(LessonKind::Theory) => {
                if let Some(group) = &lesson.group_name {
                    description.push(format!("Group: {group}"));
                }
            }
            Some(LessonKind::Practice) => {
                if let Some(instructor) = &lesson.instructor_name {
                    description.push(format!("Instructor: {instructor}"));
                }
                if let Some(student) = &lesson.student_name {
                    description.push(format!("Student: {student}"));
                }
            }
            None => {}
        }

        let mut event = Event::new();
        event.summary(&format!("{type_label}: {topic}"));
        event.starts(start);
        event.ends(end);
        if let Some(classroom) = &lesson.classroom_name {
            event.location(classroom);
        }
        event.description(&description.join("\n"));
        event.uid(&format!("lesson-{}-driving-school", lesson.lesson_id));
        Some(event.done())
    }

    /// Renders the lessons with a start time as iCalendar events. Empty when no
    /// lesson can be placed.
    pub fn generate(&self, lessons: &[Lesson], refs: &ReferenceTables) -> Vec<u8> {
        let events: Vec<Event> = lessons
            .iter()
            .filter_map(|lesson| self.event(lesson, refs))
            .collect();
        if events.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);
        for event in events {
            calendar.push(event);
        }
        calendar.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(value: serde_json::Value) -> Lesson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_generate_practice_lesson() {
        let exporter = ScheduleExporter::new("Driving School Schedule");
        let lessons = vec![lesson(serde_json::json!({
            "lesson_id": 12,
            "start_time": "2024-05-10T09:00:00",
            "end_time": "2024-05-10T10:30:00",
            "lesson_type": "Practical",
            "lesson_topic": "Parking",
            "lesson_status": "Scheduled",
            "instructor_name": "Ivan Petrenko",
            "student_name": "Anna Koval"
        }))];
        let body = String::from_utf8(exporter.generate(&lessons, &ReferenceTables::default())).unwrap();
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("Practical: Parking"));
        assert!(body.contains("lesson-12-driving-school"));
        assert!(body.contains("Instructor: Ivan Petrenko"));
        assert!(body.contains("Driving School Schedule"));
    }

    #[test]
    fn test_labels_fall_back_to_reference_tables() {
        let exporter = ScheduleExporter::new("Schedule");
        let lessons = vec![lesson(serde_json::json!({
            "lesson_id": 3,
            "start_time": "2024-05-10T09:00:00",
            "lesson_type_id": 99
        }))];
        let body = String::from_utf8(exporter.generate(&lessons, &ReferenceTables::default())).unwrap();
        assert!(body.contains("N/A: N/A"));
    }

    #[test]
    fn test_generate_skips_unscheduled_lessons() {
        let exporter = ScheduleExporter::new("Schedule");
        let lessons = vec![lesson(serde_json::json!({"lesson_id": 1, "start_time": null}))];
        assert!(exporter.generate(&lessons, &ReferenceTables::default()).is_empty());
        assert!(exporter.generate(&[], &ReferenceTables::default()).is_empty());
    }
}
