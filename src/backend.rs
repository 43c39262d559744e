use std::fmt;
use std::sync::Arc;

use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;
use utoipa::ToSchema;

use crate::de;
use crate::lesson_form::LessonPayload;
use crate::models::{
    ExamPeriod, ExamScore, Lesson, LessonStatus, LessonTopic, LessonTypeRow, LoginEnvelope,
    LoginRequest, LoginUser, ReferenceTables,
};
use crate::records::{APPROVED, Application, Enrollment, Resource};
use crate::session::{Role, Session};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected backend response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("Access denied: insufficient permissions")]
    AccessDenied,
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Backend base URL cannot be used as a base")]
    InvalidBaseUrl,
    #[error("A username is required for {0} requests")]
    MissingUsername(Role),
    #[error("Backend profile has no {0}")]
    MissingProfileId(&'static str),
}

/// Pulls the human-readable message out of a non-2xx body: `error`, then
/// `message`, then the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"]
                .iter()
                .find_map(|field| value.get(field)?.as_str().map(str::to_string))
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

/// Lists shown on the instructor and teacher dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DashboardView {
    Students,
    Exams,
    Groups,
    Car,
}

impl DashboardView {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardView::Students => "students",
            DashboardView::Exams => "exams",
            DashboardView::Groups => "groups",
            DashboardView::Car => "car",
        }
    }

    /// Backend path segments for `role`, or `None` when the role has no such view.
    pub fn segments(&self, role: Role) -> Option<Vec<&'static str>> {
        match (self, role) {
            (_, Role::Admin) => None,
            (DashboardView::Students, role) => Some(vec!["api", role.as_str(), "my-students"]),
            (DashboardView::Exams, role) => Some(vec!["api", role.as_str(), "my-exams"]),
            (DashboardView::Groups, Role::Teacher) => Some(vec!["api", "teacher", "my-groups"]),
            (DashboardView::Car, Role::Instructor) => {
                Some(vec!["api", "instructor", "car", "info"])
            }
            _ => None,
        }
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct InstructorProfile {
    #[serde(default, deserialize_with = "de::lenient_id")]
    instructor_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TeacherProfile {
    #[serde(default, deserialize_with = "de::lenient_id")]
    teacher_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status_id: i64,
}

#[derive(Debug, Serialize)]
struct ApplicationStatus<'a> {
    status: &'a str,
}

const ENROLLMENT_PATH: [&str; 4] = ["api", "admin", "ApplicationsComponent", "students"];

/// A lecture PDF as served by the backend.
#[derive(Debug, Clone)]
pub struct LectureFile {
    pub content_type: HeaderValue,
    pub content_disposition: Option<HeaderValue>,
    pub bytes: Vec<u8>,
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// REST client for the driving-school backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
}

impl BackendClient {
    pub fn new(base_url: Url) -> Result<Self, BackendError> {
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, BackendError> {
        let mut url = (*self.base_url).clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn resource_url(&self, path: &str, key: Option<&str>) -> Result<Url, BackendError> {
        self.url(path_segments(path).chain(key))
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        debug!(%method, %url, role = %session.role, "backend request");
        self.client
            .request(method, url)
            .headers(session.backend_headers())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|err| {
            error!(error = %err, "backend transport failure");
            BackendError::Transport(err)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::AccessDenied);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        debug!(%status, %message, "backend rejected request");
        Err(BackendError::Status { status, message })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        response.json().await.map_err(BackendError::Decode)
    }

    /// Mutation responses are not always JSON, and may be empty.
    async fn body(response: Response) -> Result<Value, BackendError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    async fn get<T: DeserializeOwned>(&self, session: &Session, url: Url) -> Result<T, BackendError> {
        let response = self.send(self.request(Method::GET, url, session)).await?;
        Self::json(response).await
    }

    pub async fn list<R: Resource>(&self, session: &Session) -> Result<Vec<R>, BackendError> {
        self.get(session, self.resource_url(R::PATH, None)?).await
    }

    /// The collection's rows exactly as the backend sent them.
    pub async fn list_rows<R: Resource>(&self, session: &Session) -> Result<Vec<Value>, BackendError> {
        self.get(session, self.resource_url(R::PATH, None)?).await
    }

    pub async fn create<R: Resource, B: Serialize + ?Sized>(
        &self,
        session: &Session,
        body: &B,
    ) -> Result<Value, BackendError> {
        let url = self.resource_url(R::PATH, None)?;
        let response = self
            .send(self.request(Method::POST, url, session).json(body))
            .await?;
        Self::body(response).await
    }

    pub async fn update<R: Resource, B: Serialize + ?Sized>(
        &self,
        session: &Session,
        key: &str,
        body: &B,
    ) -> Result<Value, BackendError> {
        let url = self.resource_url(R::PATH, Some(key))?;
        let response = self
            .send(self.request(Method::PUT, url, session).json(body))
            .await?;
        Self::body(response).await
    }

    pub async fn delete<R: Resource>(&self, session: &Session, key: &str) -> Result<(), BackendError> {
        let url = self.resource_url(R::PATH, Some(key))?;
        self.send(self.request(Method::DELETE, url, session)).await?;
        Ok(())
    }

    /// Lessons visible to the session: all lessons for admins, otherwise the
    /// lessons of the instructor or teacher behind the username.
    pub async fn lessons(&self, session: &Session) -> Result<Vec<Lesson>, BackendError> {
        match session.role {
            Role::Admin => self.list::<Lesson>(session).await,
            Role::Instructor => {
                let username = session
                    .username
                    .as_deref()
                    .ok_or(BackendError::MissingUsername(session.role))?;
                let profile: InstructorProfile = self
                    .get(session, self.url(["api", "instructor", "profile", username])?)
                    .await?;
                let id = profile
                    .instructor_id
                    .ok_or(BackendError::MissingProfileId("instructor_id"))?
                    .to_string();
                self.get(session, self.url(["api", "instructor", "lessons", id.as_str()])?)
                    .await
            }
            Role::Teacher => {
                let username = session
                    .username
                    .as_deref()
                    .ok_or(BackendError::MissingUsername(session.role))?;
                let profile: TeacherProfile = self
                    .get(session, self.url(["api", "teacher", "profile", username])?)
                    .await?;
                let id = profile
                    .teacher_id
                    .ok_or(BackendError::MissingProfileId("teacher_id"))?
                    .to_string();
                self.get(session, self.url(["api", "teacher", "lessons", id.as_str()])?)
                    .await
            }
        }
    }

    pub async fn create_lesson(
        &self,
        session: &Session,
        payload: &LessonPayload,
    ) -> Result<Value, BackendError> {
        self.create::<Lesson, _>(session, payload).await
    }

    pub async fn update_lesson(
        &self,
        session: &Session,
        lesson_id: i64,
        payload: &LessonPayload,
    ) -> Result<Value, BackendError> {
        self.update::<Lesson, _>(session, &lesson_id.to_string(), payload)
            .await
    }

    pub async fn delete_lesson(&self, session: &Session, lesson_id: i64) -> Result<(), BackendError> {
        self.delete::<Lesson>(session, &lesson_id.to_string()).await
    }

    pub async fn update_lesson_status(
        &self,
        session: &Session,
        lesson_id: i64,
        status_id: i64,
    ) -> Result<Value, BackendError> {
        let id = lesson_id.to_string();
        let url = self.url(["api", "instructor", "lessons", id.as_str(), "status"])?;
        let response = self
            .send(
                self.request(Method::PUT, url, session)
                    .json(&StatusBody { status_id }),
            )
            .await?;
        Self::body(response).await
    }

    async fn reference<T: DeserializeOwned>(&self, session: &Session, table: &str) -> Vec<T> {
        let result = match self.url(["api", session.role.as_str(), table]) {
            Ok(url) => self.get(session, url).await,
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            warn!(table, error = %err, "failed to load reference table");
            Vec::new()
        })
    }

    /// Lesson types, statuses and topics, fetched concurrently. A table that
    /// fails to load is logged and left empty.
    pub async fn reference_tables(&self, session: &Session) -> ReferenceTables {
        let (types, statuses, topics) = futures::join!(
            self.reference::<LessonTypeRow>(session, "lesson_types"),
            self.reference::<LessonStatus>(session, "lesson_statuses"),
            self.reference::<LessonTopic>(session, "lesson_topics"),
        );
        ReferenceTables {
            types: types.into_iter().map(Into::into).collect(),
            statuses,
            topics,
        }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginUser, BackendError> {
        let url = self.url(["api", "login"])?;
        debug!(%url, username = %credentials.username, "backend login");
        let response = self
            .send(self.client.post(url).json(credentials))
            .await?;
        let envelope: LoginEnvelope = Self::json(response).await?;
        Ok(envelope.user)
    }

    /// Passthrough for a dashboard list. `None` when the role has no such view.
    pub async fn dashboard(
        &self,
        session: &Session,
        view: DashboardView,
    ) -> Result<Option<Value>, BackendError> {
        let Some(segments) = view.segments(session.role) else {
            return Ok(None);
        };
        self.get(session, self.url(segments)?).await.map(Some)
    }

    /// Marks the application approved, then creates the student record for it.
    /// Returns the updated application.
    pub async fn approve_application(
        &self,
        session: &Session,
        enrollment: &Enrollment,
    ) -> Result<Value, BackendError> {
        let key = enrollment.application_id.to_string();
        let approved = self
            .update::<Application, _>(session, &key, &ApplicationStatus { status: APPROVED })
            .await?;
        let url = self.url(ENROLLMENT_PATH)?;
        self.send(self.request(Method::POST, url, session).json(enrollment))
            .await?;
        Ok(approved)
    }

    /// Sets a roster student's exam score. `None` when the role keeps no roster.
    pub async fn update_exam_score(
        &self,
        session: &Session,
        student_id: i64,
        score: &ExamScore,
    ) -> Result<Option<Value>, BackendError> {
        if session.role == Role::Admin {
            return Ok(None);
        }
        let id = student_id.to_string();
        let url = self.url(["api", session.role.as_str(), "update-exam-score", id.as_str()])?;
        let response = self
            .send(self.request(Method::PUT, url, session).json(score))
            .await?;
        Self::body(response).await.map(Some)
    }

    /// Exam counters for the instructor behind the session.
    pub async fn exam_stats(&self, session: &Session) -> Result<Option<Value>, BackendError> {
        if session.role != Role::Instructor {
            return Ok(None);
        }
        self.get(session, self.url(["api", "instructor", "my-exams", "stats"])?)
            .await
            .map(Some)
    }

    /// The instructor's exams inside `period`, ordered by start time.
    pub async fn exams_in_period(
        &self,
        session: &Session,
        period: &ExamPeriod,
    ) -> Result<Option<Value>, BackendError> {
        if session.role != Role::Instructor {
            return Ok(None);
        }
        let mut url = self.url(["api", "instructor", "my-exams", "period"])?;
        let pairs = period.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.get(session, url).await.map(Some)
    }

    pub async fn lectures(&self, session: &Session) -> Result<Value, BackendError> {
        self.get(session, self.url(["api", "pdf-files"])?).await
    }

    pub async fn lecture_file(&self, session: &Session, id: i64) -> Result<LectureFile, BackendError> {
        let id = id.to_string();
        let url = self.url(["api", "pdf-files", id.as_str()])?;
        let response = self.send(self.request(Method::GET, url, session)).await?;
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/pdf"));
        let content_disposition = headers.get(CONTENT_DISPOSITION).cloned();
        let bytes = response.bytes().await?.to_vec();
        Ok(LectureFile {
            content_type,
            content_disposition,
            bytes,
        })
    }

    pub async fn lecture_info(&self, session: &Session, id: i64) -> Result<Value, BackendError> {
        let id = id.to_string();
        self.get(session, self.url(["api", "pdf-files", id.as_str(), "info"])?)
            .await
    }

    pub async fn delete_lecture(&self, session: &Session, id: i64) -> Result<(), BackendError> {
        let id = id.to_string();
        let url = self.url(["api", "pdf-files", id.as_str()])?;
        self.send(self.request(Method::DELETE, url, session)).await?;
        Ok(())
    }

    pub async fn analytics(&self, session: &Session) -> Result<Value, BackendError> {
        self.get(session, self.url(["api", "analytics", "dashboard"])?)
            .await
    }
}
