use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::academic;
use crate::input::{self, AdvisorInfo, NewCourse};
use crate::models::{Course, GradeScaleEntry, Role, Semester, StudentProfile, StudentRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct StudentSeed {
    id: &'static str,
    name: &'static str,
    nim: &'static str,
    email: &'static str,
    major: &'static str,
    class_year: &'static str,
    role: Role,
}

#[tracing::instrument(skip_all)]
pub async fn seed(pool: &PgPool, scale: &[GradeScaleEntry]) -> anyhow::Result<()> {
    let students = [
        StudentSeed {
            id: "6c1f1f4e-0a6b-4b0e-9d4a-1f2f6b8f9a01",
            name: "Admin Unsri",
            nim: "0000000000000",
            email: "admin@unsri.ac.id",
            major: "Administration",
            class_year: "N/A",
            role: Role::Admin,
        },
        StudentSeed {
            id: "2b8e0f0c-3d4e-4f5a-8b6c-7d8e9f0a1b02",
            name: "Rani Putri Lestari",
            nim: "09021282227001",
            email: "rani.lestari@student.unsri.ac.id",
            major: "Informatika",
            class_year: "2022",
            role: Role::Student,
        },
        StudentSeed {
            id: "9a7b6c5d-4e3f-4a2b-9c1d-0e9f8a7b6c03",
            name: "Bima Saputra",
            nim: "09031282328002",
            email: "bima.saputra@student.unsri.ac.id",
            major: "Sistem Informasi",
            class_year: "2023",
            role: Role::Student,
        },
    ];

    let mut tx = pool.begin().await?;

    for seed in students.iter() {
        let profile = StudentProfile {
            name: seed.name.to_string(),
            nim: seed.nim.to_string(),
            email: seed.email.to_string(),
            major: seed.major.to_string(),
            class_year: seed.class_year.to_string(),
            advisor_name: None,
            advisor_nip: None,
            transcript_place_and_date: None,
            role: seed.role,
        };
        upsert_student(&mut tx, Uuid::parse_str(seed.id)?, &profile).await?;
    }

    let courses = [
        ("seed-001", "09021282227001", "Semester 1", "Kalkulus I", 3, Some(88.0)),
        ("seed-002", "09021282227001", "Semester 1", "Algoritma dan Pemrograman", 4, Some(79.5)),
        ("seed-003", "09021282227001", "Semester 1", "Bahasa Inggris", 2, Some(91.0)),
        ("seed-004", "09021282227001", "Semester 2", "Struktur Data", 4, Some(74.0)),
        ("seed-005", "09021282227001", "Semester 2", "Matematika Diskrit", 3, Some(62.0)),
        ("seed-006", "09021282227001", "Semester 3", "Basis Data", 3, None),
        ("seed-007", "09031282328002", "Semester 1", "Pengantar Sistem Informasi", 3, Some(58.0)),
        ("seed-008", "09031282328002", "Semester 1", "Logika Informatika", 3, Some(45.0)),
    ];

    let mut touched = HashSet::new();
    for (source_key, nim, semester_name, course_name, credits, score) in courses {
        let student_id = student_id_for_nim(&mut *tx, nim)
            .await?
            .with_context(|| format!("seed student {nim} missing"))?;
        let semester_id = ensure_semester(&mut tx, student_id, semester_name).await?;
        let course = NewCourse {
            name: course_name.to_string(),
            credits,
            score,
        };
        insert_course(&mut tx, Uuid::new_v4(), semester_id, &course, source_key).await?;
        touched.insert(student_id);
    }

    for student_id in touched {
        refresh_student_ips(&mut tx, student_id, scale).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// One validated line of a grade import file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub profile: StudentProfile,
    pub semester: String,
    pub course: NewCourse,
    pub source_key: Option<String>,
}

/// Parses and validates a whole import file before anything is written.
pub fn read_import_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> anyhow::Result<Vec<ImportRow>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        nim: String,
        full_name: String,
        email: String,
        major: String,
        class_year: String,
        semester: String,
        course: String,
        credits: i32,
        score: Option<f64>,
        source_key: Option<String>,
    }

    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let course = NewCourse {
            name: row.course.trim().to_string(),
            credits: row.credits,
            score: row.score,
        };
        course
            .validate()
            .with_context(|| format!("invalid course on CSV row {}", line + 1))?;
        input::validate_semester_name(&row.semester)
            .with_context(|| format!("invalid semester on CSV row {}", line + 1))?;

        rows.push(ImportRow {
            profile: StudentProfile {
                name: row.full_name.trim().to_string(),
                nim: row.nim.trim().to_string(),
                email: row.email.trim().to_string(),
                major: row.major.trim().to_string(),
                class_year: row.class_year.trim().to_string(),
                advisor_name: None,
                advisor_nip: None,
                transcript_place_and_date: None,
                role: Role::Student,
            },
            semester: row.semester.trim().to_string(),
            course,
            source_key: row.source_key.filter(|key| !key.trim().is_empty()),
        });
    }

    Ok(rows)
}

/// Imports a grade file in a single transaction. A bad row aborts the whole import.
#[tracing::instrument(skip(pool, scale), fields(path = %csv_path.display()))]
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<usize> {
    let rows = read_import_rows(csv::Reader::from_path(csv_path)?)?;
    let mut inserted = 0usize;
    let mut touched = HashSet::new();
    let mut tx = pool.begin().await?;

    for row in rows {
        let student_id = upsert_student(&mut tx, Uuid::new_v4(), &row.profile).await?;
        let semester_id = ensure_semester(&mut tx, student_id, &row.semester).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let course_id = Uuid::new_v4();
        if insert_course(&mut tx, course_id, semester_id, &row.course, &source_key).await? {
            inserted += 1;
        } else {
            debug!(%source_key, "course already imported");
        }
        touched.insert(student_id);
    }

    for student_id in touched {
        refresh_student_ips(&mut tx, student_id, scale).await?;
    }

    tx.commit().await?;
    info!(inserted, "csv import finished");
    Ok(inserted)
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        "SELECT id, full_name, nim, email, major, class_year, advisor_name, advisor_nip, \
         transcript_place_and_date, role, last_admin_edit \
         FROM academic_records.students ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
    let mut semesters = load_semesters(pool, &ids).await?;

    let records = rows
        .iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            student_from_row(row, semesters.remove(&id).unwrap_or_default())
        })
        .collect();

    Ok(records)
}

pub async fn fetch_student(pool: &PgPool, nim: &str) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(
        "SELECT id, full_name, nim, email, major, class_year, advisor_name, advisor_nip, \
         transcript_place_and_date, role, last_admin_edit \
         FROM academic_records.students WHERE nim = $1",
    )
    .bind(nim)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: Uuid = row.get("id");
    let mut semesters = load_semesters(pool, &[id]).await?;
    Ok(Some(student_from_row(
        &row,
        semesters.remove(&id).unwrap_or_default(),
    )))
}

/// Writes the transcript signature fields. Returns false when no student has that NIM.
#[tracing::instrument(skip(pool, info))]
pub async fn update_advisor_info(
    pool: &PgPool,
    nim: &str,
    info: AdvisorInfo,
) -> anyhow::Result<bool> {
    let info = info.normalized()?;
    let result = sqlx::query(
        r#"
        UPDATE academic_records.students
        SET advisor_name = CASE WHEN $2::TEXT IS NULL THEN advisor_name ELSE NULLIF($2, '') END,
            advisor_nip = CASE WHEN $3::TEXT IS NULL THEN advisor_nip ELSE NULLIF($3, '') END,
            transcript_place_and_date = CASE
                WHEN $4::TEXT IS NULL THEN transcript_place_and_date
                ELSE NULLIF($4, '')
            END
        WHERE nim = $1
        "#,
    )
    .bind(nim)
    .bind(info.advisor_name)
    .bind(info.advisor_nip)
    .bind(info.transcript_place_and_date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(skip(pool))]
pub async fn add_semester(pool: &PgPool, nim: &str, name: &str) -> anyhow::Result<Uuid> {
    input::validate_semester_name(name)?;
    let mut tx = pool.begin().await?;
    let student_id = student_id_for_nim(&mut *tx, nim)
        .await?
        .with_context(|| format!("no student with NIM {nim}"))?;
    let semester_id = ensure_semester(&mut tx, student_id, name.trim()).await?;
    tx.commit().await?;
    Ok(semester_id)
}

/// Removes a semester and its courses. Returns false when the student has no such semester.
#[tracing::instrument(skip(pool, scale))]
pub async fn delete_semester(
    pool: &PgPool,
    nim: &str,
    name: &str,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;
    let Some(student_id) = student_id_for_nim(&mut *tx, nim).await? else {
        return Ok(false);
    };

    let result = sqlx::query(
        "DELETE FROM academic_records.semesters WHERE student_id = $1 AND name = $2",
    )
    .bind(student_id)
    .bind(name.trim())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    refresh_student_ips(&mut tx, student_id, scale).await?;
    tx.commit().await?;
    Ok(true)
}

#[tracing::instrument(skip(pool, course, scale))]
pub async fn add_course(
    pool: &PgPool,
    nim: &str,
    semester_name: &str,
    course: &NewCourse,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<Uuid> {
    course.validate()?;
    input::validate_semester_name(semester_name)?;
    let mut tx = pool.begin().await?;
    let student_id = student_id_for_nim(&mut *tx, nim)
        .await?
        .with_context(|| format!("no student with NIM {nim}"))?;
    let semester_id = ensure_semester(&mut tx, student_id, semester_name.trim()).await?;

    let course_id = Uuid::new_v4();
    let source_key = format!("manual-{course_id}");
    insert_course(&mut tx, course_id, semester_id, course, &source_key).await?;

    refresh_student_ips(&mut tx, student_id, scale).await?;
    tx.commit().await?;
    Ok(course_id)
}

/// Removes one course. Returns false when no course has that id.
#[tracing::instrument(skip(pool, scale))]
pub async fn delete_course(
    pool: &PgPool,
    course_id: Uuid,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;
    let student_id: Option<Uuid> = sqlx::query(
        r#"
        DELETE FROM academic_records.courses c
        USING academic_records.semesters s
        WHERE c.id = $1 AND s.id = c.semester_id
        RETURNING s.student_id
        "#,
    )
    .bind(course_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("student_id"));

    let Some(student_id) = student_id else {
        return Ok(false);
    };

    refresh_student_ips(&mut tx, student_id, scale).await?;
    tx.commit().await?;
    Ok(true)
}

/// Updates or clears a course score and stamps the owning student as edited.
///
/// Returns false when no course has that id.
#[tracing::instrument(skip(pool, scale))]
pub async fn set_score(
    pool: &PgPool,
    course_id: Uuid,
    score: Option<f64>,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<bool> {
    input::validate_score(score)?;
    let mut tx = pool.begin().await?;

    let student_id: Option<Uuid> = sqlx::query(
        r#"
        UPDATE academic_records.courses c
        SET score = $2
        FROM academic_records.semesters s
        WHERE c.id = $1 AND s.id = c.semester_id
        RETURNING s.student_id
        "#,
    )
    .bind(course_id)
    .bind(score)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("student_id"));

    let Some(student_id) = student_id else {
        return Ok(false);
    };

    sqlx::query("UPDATE academic_records.students SET last_admin_edit = $2 WHERE id = $1")
        .bind(student_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    refresh_student_ips(&mut tx, student_id, scale).await?;
    tx.commit().await?;
    Ok(true)
}

#[tracing::instrument(skip(pool))]
pub async fn delete_student(pool: &PgPool, nim: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM academic_records.students WHERE nim = $1")
        .bind(nim)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Recomputes and stores the cached IPS of every semester of one student.
async fn refresh_student_ips(
    conn: &mut PgConnection,
    student_id: Uuid,
    scale: &[GradeScaleEntry],
) -> anyhow::Result<()> {
    let mut semesters = load_semesters(&mut *conn, &[student_id])
        .await?
        .remove(&student_id)
        .unwrap_or_default();
    academic::refresh_ips(&mut semesters, scale);

    for semester in semesters.iter() {
        sqlx::query("UPDATE academic_records.semesters SET ips = $2 WHERE id = $1")
            .bind(semester.id)
            .bind(semester.ips)
            .execute(&mut *conn)
            .await?;
    }

    debug!(%student_id, semesters = semesters.len(), "refreshed cached IPS");
    Ok(())
}

async fn upsert_student(
    conn: &mut PgConnection,
    id: Uuid,
    profile: &StudentProfile,
) -> anyhow::Result<Uuid> {
    let student_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_records.students
        (id, full_name, nim, email, major, class_year, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (nim) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            email = EXCLUDED.email,
            major = EXCLUDED.major,
            class_year = EXCLUDED.class_year
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(&profile.name)
    .bind(&profile.nim)
    .bind(&profile.email)
    .bind(&profile.major)
    .bind(&profile.class_year)
    .bind(profile.role.as_str())
    .fetch_one(conn)
    .await?
    .get("id");

    Ok(student_id)
}

async fn student_id_for_nim<'e, E: PgExecutor<'e>>(
    executor: E,
    nim: &str,
) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query("SELECT id FROM academic_records.students WHERE nim = $1")
        .bind(nim)
        .fetch_optional(executor)
        .await?
        .map(|row| row.get("id"));
    Ok(id)
}

/// Returns the semester id, appending a new semester at the end of the order if needed.
async fn ensure_semester(
    conn: &mut PgConnection,
    student_id: Uuid,
    name: &str,
) -> anyhow::Result<Uuid> {
    let semester_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_records.semesters (id, student_id, name, position)
        SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0)
        FROM academic_records.semesters WHERE student_id = $2
        ON CONFLICT (student_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(name)
    .fetch_one(conn)
    .await?
    .get("id");

    Ok(semester_id)
}

/// Inserts a course at the end of its semester unless its source key is already present.
async fn insert_course(
    conn: &mut PgConnection,
    course_id: Uuid,
    semester_id: Uuid,
    course: &NewCourse,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academic_records.courses
        (id, semester_id, name, credits, score, position, source_key)
        SELECT $1, $2, $3, $4, $5, COALESCE(MAX(position) + 1, 0), $6
        FROM academic_records.courses WHERE semester_id = $2
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(course_id)
    .bind(semester_id)
    .bind(course.name.trim())
    .bind(course.credits)
    .bind(course.score)
    .bind(source_key)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn load_semesters<'e, E: PgExecutor<'e>>(
    executor: E,
    student_ids: &[Uuid],
) -> anyhow::Result<HashMap<Uuid, Vec<Semester>>> {
    let rows = sqlx::query(
        "SELECT s.student_id, s.id AS semester_id, s.name AS semester_name, s.ips, \
         c.id AS course_id, c.name AS course_name, c.credits, c.score \
         FROM academic_records.semesters s \
         LEFT JOIN academic_records.courses c ON c.semester_id = s.id \
         WHERE s.student_id = ANY($1) \
         ORDER BY s.student_id, s.position, c.position",
    )
    .bind(student_ids)
    .fetch_all(executor)
    .await?;

    let mut by_student: HashMap<Uuid, Vec<Semester>> = HashMap::new();

    for row in rows {
        let student_id: Uuid = row.get("student_id");
        let semester_id: Uuid = row.get("semester_id");
        let semesters = by_student.entry(student_id).or_default();

        if semesters.last().map(|s| s.id) != Some(semester_id) {
            semesters.push(Semester {
                id: semester_id,
                name: row.get("semester_name"),
                courses: Vec::new(),
                ips: row.get("ips"),
            });
        }

        let course_id: Option<Uuid> = row.get("course_id");
        if let (Some(id), Some(semester)) = (course_id, semesters.last_mut()) {
            semester.courses.push(Course {
                id,
                name: row.get("course_name"),
                credits: row.get("credits"),
                score: row.get("score"),
            });
        }
    }

    Ok(by_student)
}

fn student_from_row(row: &sqlx::postgres::PgRow, semesters: Vec<Semester>) -> StudentRecord {
    let role: String = row.get("role");
    let last_admin_edit: Option<DateTime<Utc>> = row.get("last_admin_edit");
    StudentRecord {
        id: row.get("id"),
        profile: StudentProfile {
            name: row.get("full_name"),
            nim: row.get("nim"),
            email: row.get("email"),
            major: row.get("major"),
            class_year: row.get("class_year"),
            advisor_name: row.get("advisor_name"),
            advisor_nip: row.get("advisor_nip"),
            transcript_place_and_date: row.get("transcript_place_and_date"),
            role: Role::parse(&role),
        },
        semesters,
        last_admin_edit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "nim,full_name,email,major,class_year,semester,course,credits,score,source_key\n";

    fn reader(body: &str) -> csv::Reader<std::io::Cursor<String>> {
        csv::Reader::from_reader(std::io::Cursor::new(format!("{HEADER}{body}")))
    }

    #[test]
    fn import_rows_are_trimmed_and_pending_scores_kept() {
        let rows = read_import_rows(reader(
            "0902001,Sari,sari@unsri.ac.id,Informatika,2022, Semester 1 ,Kalkulus I,3,86,k-1\n\
             0902001,Sari,sari@unsri.ac.id,Informatika,2022,Semester 1,Fisika,3,,\n",
        ))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].semester, "Semester 1");
        assert_eq!(rows[0].semester, rows[1].semester);
        assert_eq!(rows[0].course.score, Some(86.0));
        assert_eq!(rows[0].source_key.as_deref(), Some("k-1"));
        assert_eq!(rows[1].course.score, None);
        assert_eq!(rows[1].source_key, None);
        assert_eq!(rows[1].profile.role, Role::Student);
    }

    #[test]
    fn one_invalid_row_rejects_the_whole_file() {
        let err = read_import_rows(reader(
            "0902001,Sari,sari@unsri.ac.id,Informatika,2022,Semester 1,Kalkulus I,3,86,k-1\n\
             0902001,Sari,sari@unsri.ac.id,Informatika,2022,Semester 1,Fisika,3,70,k-2\n\
             0902001,Sari,sari@unsri.ac.id,Informatika,2022,Semester 1,Kimia,0,80,k-3\n",
        ))
        .unwrap_err();

        assert!(err.to_string().contains("CSV row 3"), "{err}");
    }

    #[test]
    fn blank_semester_is_rejected() {
        let err = read_import_rows(reader(
            "0902001,Sari,sari@unsri.ac.id,Informatika,2022,  ,Kalkulus I,3,86,k-1\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("CSV row 1"), "{err}");
    }
}
