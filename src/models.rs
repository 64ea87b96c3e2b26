use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeColor {
    Green,
    Blue,
    Yellow,
    Orange,
    Red,
    #[default]
    Gray,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDetails {
    pub letter: String,
    pub point: f64,
    #[serde(default)]
    pub color: GradeColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeScaleEntry {
    pub min_score: f64,
    pub details: GradeDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub credits: i32,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: Uuid,
    pub name: String,
    pub courses: Vec<Course>,
    pub ips: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Student
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub nim: String,
    pub email: String,
    pub major: String,
    pub class_year: String,
    pub advisor_name: Option<String>,
    pub advisor_nip: Option<String>,
    pub transcript_place_and_date: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub profile: StudentProfile,
    pub semesters: Vec<Semester>,
    pub last_admin_edit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SemesterTotals {
    pub ips: Option<f64>,
    pub semester_credits: i32,
    pub semester_quality_points: f64,
    pub graded_courses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedSemester {
    #[serde(flatten)]
    pub semester: Semester,
    pub semester_credits: i32,
    pub semester_quality_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionPoint {
    pub semester_name: String,
    pub ipk: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcademicSummary {
    pub ipk: Option<f64>,
    pub total_credits: i32,
    pub total_quality_points: f64,
    pub ipk_progression: Vec<ProgressionPoint>,
    pub processed_semesters: Vec<ProcessedSemester>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentStanding {
    pub name: String,
    pub nim: String,
    pub email: String,
    pub major: String,
    pub class_year: String,
    pub ipk: Option<f64>,
    pub total_credits: i32,
    pub last_admin_edit: Option<DateTime<Utc>>,
}
