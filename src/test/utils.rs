use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::api::LoginResponse;
use crate::auth::Role;
use crate::db::{create_assignment, create_holiday, create_student, create_user};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::face::{FaceMatch, FaceVerifier, LivenessChallenge, LivenessResult};
use crate::init_rocket;
use crate::models::NewStudent;

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";
pub const ADMISSION_YEAR: i32 = 2025;

struct TestUser {
    username: String,
    display_name: Option<String>,
    role: Role,
    password: String,
}

struct TestStudent {
    gr_no: String,
    name: String,
    standard: String,
    class_name: String,
    roll_no: Option<i64>,
}

struct TestAssignment {
    teacher_username: String,
    standard: String,
    class_name: String,
    subject: String,
}

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    students: Vec<TestStudent>,
    assignments: Vec<TestAssignment>,
    holidays: Vec<(chrono::NaiveDate, String)>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(mut self, username: &str, display_name: Option<&str>, role: Role) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            display_name: display_name.map(String::from),
            role,
            password: STANDARD_PASSWORD.to_string(),
        });
        self
    }

    pub fn admin(self, username: &str, display_name: Option<&str>) -> Self {
        self.user(username, display_name, Role::Admin)
    }

    pub fn teacher(self, username: &str, display_name: Option<&str>) -> Self {
        self.user(username, display_name, Role::Teacher)
    }

    pub fn attendance_teacher(self, username: &str, display_name: Option<&str>) -> Self {
        self.user(username, display_name, Role::AttendanceTeacher)
    }

    pub fn student(
        mut self,
        gr_no: &str,
        name: &str,
        standard: &str,
        class_name: &str,
        roll_no: Option<i64>,
    ) -> Self {
        self.students.push(TestStudent {
            gr_no: gr_no.to_string(),
            name: name.to_string(),
            standard: standard.to_string(),
            class_name: class_name.to_string(),
            roll_no,
        });
        self
    }

    pub fn assignment(
        mut self,
        teacher_username: &str,
        standard: &str,
        class_name: &str,
        subject: &str,
    ) -> Self {
        self.assignments.push(TestAssignment {
            teacher_username: teacher_username.to_string(),
            standard: standard.to_string(),
            class_name: class_name.to_string(),
            subject: subject.to_string(),
        });
        self
    }

    pub fn holiday(mut self, date: chrono::NaiveDate, description: &str) -> Self {
        self.holidays.push((date, description.to_string()));
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .parse_filters("debug")
                .is_test(true)
                .try_init();
        });

        let pool = test_pool().await?;

        let mut user_id_map = HashMap::new();
        let mut student_id_map = HashMap::new();

        for user in &self.users {
            let id = create_user(
                &pool,
                &user.username,
                &user.password,
                user.role,
                user.display_name.as_deref(),
            )
            .await?;
            user_id_map.insert(user.username.clone(), id);
        }

        for student in self.students {
            let created = create_student(
                &pool,
                &NewStudent {
                    gr_no: student.gr_no.clone(),
                    name: student.name,
                    standard: student.standard,
                    class_name: student.class_name,
                    roll_no: student.roll_no,
                },
                ADMISSION_YEAR,
            )
            .await?;
            student_id_map.insert(student.gr_no, created.id);
        }

        for assignment in &self.assignments {
            let teacher_id = user_id_map
                .get(&assignment.teacher_username)
                .copied()
                .ok_or_else(|| {
                    AppError::NotFound(format!("No test user {}", assignment.teacher_username))
                })?;
            create_assignment(
                &pool,
                teacher_id,
                &assignment.standard,
                &assignment.class_name,
                &assignment.subject,
                false,
            )
            .await?;
        }

        for (date, description) in &self.holidays {
            create_holiday(&pool, *date, description).await?;
        }

        Ok(TestDb {
            pool,
            user_id_map,
            student_id_map,
        })
    }
}

/// A single long-lived connection keeps the in-memory database alive for the
/// whole test.
pub async fn test_pool() -> Result<Pool<Sqlite>, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub student_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, username: &str) -> Option<i64> {
        self.user_id_map.get(username).copied()
    }

    pub fn student_id(&self, gr_no: &str) -> Option<i64> {
        self.student_id_map.get(gr_no).copied()
    }
}

/// Admin, a subject teacher and an attendance teacher, with a handful of
/// students in 3/Dhruv and one in 3/Prahlad.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .admin("admin_user", Some("Admin User"))
        .teacher("teacher_user", Some("Teacher User"))
        .attendance_teacher("ateacher_user", Some("Attendance Teacher"))
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .student("GR-2", "Bharat", "3", "Dhruv", None)
        .student("GR-3", "Chitra", "3", "Dhruv", None)
        .student("GR-4", "Dev", "3", "Prahlad", Some(21))
        .assignment("teacher_user", "3", "Dhruv", "Maths")
        .assignment("ateacher_user", "3", "Dhruv", "English")
        .build()
        .await
        .expect("Failed to build standard test database")
}

/// Scripted face service: liveness passes or fails as configured and every
/// face resolves to `subject_id`.
pub struct MockFaceVerifier {
    pub liveness_passes: bool,
    pub subject_id: Option<String>,
    pub enrolled: Mutex<Vec<String>>,
}

impl MockFaceVerifier {
    pub fn matching(subject_id: Option<i64>) -> Self {
        Self {
            liveness_passes: true,
            subject_id: subject_id.map(|id| id.to_string()),
            enrolled: Mutex::new(Vec::new()),
        }
    }
}

#[rocket::async_trait]
impl FaceVerifier for MockFaceVerifier {
    async fn get_challenge(&self) -> Result<LivenessChallenge, AppError> {
        Ok(LivenessChallenge {
            challenge_id: "challenge-1".to_string(),
            instructions: vec!["Blink twice".to_string()],
            expires_in_seconds: 60,
        })
    }

    async fn verify_liveness(
        &self,
        _challenge_id: &str,
        _frames: &[String],
    ) -> Result<LivenessResult, AppError> {
        Ok(LivenessResult {
            passed: self.liveness_passes,
            score: if self.liveness_passes { 0.98 } else { 0.1 },
        })
    }

    async fn verify_face(&self, _challenge_id: &str, _image: &str) -> Result<FaceMatch, AppError> {
        Ok(FaceMatch {
            matched: self.subject_id.is_some(),
            subject_id: self.subject_id.clone(),
            confidence: 0.95,
        })
    }

    async fn enroll_face(&self, subject_id: &str, _image: &str) -> Result<(), AppError> {
        self.enrolled
            .lock()
            .expect("enrolled list poisoned")
            .push(subject_id.to_string());
        Ok(())
    }
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    setup_test_client_with_face(test_db, Arc::new(MockFaceVerifier::matching(None))).await
}

pub async fn setup_test_client_with_face(
    test_db: TestDb,
    face: Arc<dyn FaceVerifier>,
) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone(), AppConfig::default(), face).await;
    let client = Client::untracked(rocket)
        .await
        .expect("Failed to create test client");

    (client, test_db)
}

pub async fn login_test_user(
    client: &Client,
    username: &str,
    password: &str,
) -> Vec<Cookie<'static>> {
    let response = client
        .post("/api/login")
        .header(ContentType::JSON)
        .body(json!({ "username": username, "password": password }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let cookies: Vec<Cookie<'static>> = response.cookies().iter().cloned().collect();

    let body = response.into_string().await.expect("Empty login response");
    let login: LoginResponse = serde_json::from_str(&body).expect("Invalid login response");
    assert!(login.success, "Login failed for {}", username);

    cookies
}
