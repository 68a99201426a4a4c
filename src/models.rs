use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconciler::AttendanceMark;

fn to_utc(value: Option<NaiveDateTime>) -> DateTime<Utc> {
    value
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "ACTIVE",
            StudentStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "INACTIVE" => StudentStatus::Inactive,
            _ => StudentStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    pub gr_no: String,
    pub enrollment_no: String,
    pub roll_no: i64,
    pub name: String,
    pub standard: String,
    pub class_name: String,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbStudent {
    pub id: Option<i64>,
    pub gr_no: Option<String>,
    pub enrollment_no: Option<String>,
    pub roll_no: Option<i64>,
    pub name: Option<String>,
    pub standard: Option<String>,
    pub class_name: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbStudent> for Student {
    fn from(db: DbStudent) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            gr_no: db.gr_no.unwrap_or_default(),
            enrollment_no: db.enrollment_no.unwrap_or_default(),
            roll_no: db.roll_no.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            standard: db.standard.unwrap_or_default(),
            class_name: db.class_name.unwrap_or_default(),
            status: StudentStatus::parse(&db.status.unwrap_or_default()),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub gr_no: String,
    pub name: String,
    pub standard: String,
    pub class_name: String,
    pub roll_no: Option<i64>,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct StudentUpdate {
    pub gr_no: Option<String>,
    pub name: Option<String>,
    pub standard: Option<String>,
    pub class_name: Option<String>,
    pub roll_no: Option<i64>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherAssignment {
    pub id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub standard: String,
    pub class_name: String,
    pub subject: String,
    pub is_class_teacher: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTeacherAssignment {
    pub id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub teacher_name: Option<String>,
    pub standard: Option<String>,
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub is_class_teacher: Option<bool>,
}

impl From<DbTeacherAssignment> for TeacherAssignment {
    fn from(db: DbTeacherAssignment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            teacher_id: db.teacher_id.unwrap_or_default(),
            teacher_name: db.teacher_name.unwrap_or_default(),
            standard: db.standard.unwrap_or_default(),
            class_name: db.class_name.unwrap_or_default(),
            subject: db.subject.unwrap_or_default(),
            is_class_teacher: db.is_class_teacher.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamType {
    UnitTest,
    MidTerm,
    Final,
    Practical,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::UnitTest => "UNIT_TEST",
            ExamType::MidTerm => "MID_TERM",
            ExamType::Final => "FINAL",
            ExamType::Practical => "PRACTICAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNIT_TEST" => Some(ExamType::UnitTest),
            "MID_TERM" => Some(ExamType::MidTerm),
            "FINAL" => Some(ExamType::Final),
            "PRACTICAL" => Some(ExamType::Practical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Test {
    pub id: i64,
    pub teacher_id: i64,
    pub standard: String,
    pub class_name: String,
    pub subject: String,
    pub exam_type: ExamType,
    pub name: String,
    pub max_marks: f64,
    pub test_date: NaiveDate,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTest {
    pub id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub standard: Option<String>,
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub exam_type: Option<String>,
    pub name: Option<String>,
    pub max_marks: Option<f64>,
    pub test_date: Option<NaiveDate>,
}

impl From<DbTest> for Test {
    fn from(db: DbTest) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            teacher_id: db.teacher_id.unwrap_or_default(),
            standard: db.standard.unwrap_or_default(),
            class_name: db.class_name.unwrap_or_default(),
            subject: db.subject.unwrap_or_default(),
            exam_type: db
                .exam_type
                .as_deref()
                .and_then(ExamType::parse)
                .unwrap_or(ExamType::UnitTest),
            name: db.name.unwrap_or_default(),
            max_marks: db.max_marks.unwrap_or_default(),
            test_date: db.test_date.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTest {
    pub standard: String,
    pub class_name: String,
    pub subject: String,
    pub exam_type: ExamType,
    pub name: String,
    pub max_marks: f64,
    pub test_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mark {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub roll_no: i64,
    pub test_id: i64,
    pub score: f64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbMark {
    pub id: Option<i64>,
    pub student_id: Option<i64>,
    pub student_name: Option<String>,
    pub roll_no: Option<i64>,
    pub test_id: Option<i64>,
    pub score: Option<f64>,
}

impl From<DbMark> for Mark {
    fn from(db: DbMark) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            student_id: db.student_id.unwrap_or_default(),
            student_name: db.student_name.unwrap_or_default(),
            roll_no: db.roll_no.unwrap_or_default(),
            test_id: db.test_id.unwrap_or_default(),
            score: db.score.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkEntry {
    pub student_id: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Holiday {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbHoliday {
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl From<DbHoliday> for Holiday {
    fn from(db: DbHoliday) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            date: db.date.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub status: AttendanceMark,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSheet {
    pub id: i64,
    pub date: NaiveDate,
    pub standard: String,
    pub class_name: String,
    pub marked_by: Option<i64>,
    pub records: Vec<AttendanceEntry>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceRow {
    pub student_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}
