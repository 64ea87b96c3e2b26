use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

mod academic;
mod analytics;
mod db;
mod grade;
mod input;
mod models;
mod report;
mod settings;

use crate::input::{AdvisorInfo, NewCourse};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "academic-records")]
#[command(
    about = "Student academic records: IPS/IPK, transcripts and cohort analytics",
    long_about = None
)]
struct Cli {
    /// JSON settings file with the grade scale and credit target
    #[arg(long, global = true, env = "ACADEMIC_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo students, semesters and courses
    Seed,
    /// Import courses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Resolve a numeric score against the grade scale
    Grade {
        #[arg(long, allow_negative_numbers = true)]
        score: Option<f64>,
    },
    /// Print the active grade scale
    Scale,
    /// Show IPK, last IPS, credits and progression for one student
    Summary {
        #[arg(long)]
        nim: String,
        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown transcript for one student
    Transcript {
        #[arg(long)]
        nim: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Set transcript signature fields; an empty value clears a field
    UpdateProfile {
        #[arg(long)]
        nim: String,
        #[arg(long)]
        advisor_name: Option<String>,
        #[arg(long)]
        advisor_nip: Option<String>,
        #[arg(long)]
        place_and_date: Option<String>,
    },
    /// Add an empty semester at the end of a student's record
    AddSemester {
        #[arg(long)]
        nim: String,
        #[arg(long)]
        name: String,
    },
    /// Remove a semester and its courses
    DeleteSemester {
        #[arg(long)]
        nim: String,
        #[arg(long)]
        name: String,
    },
    /// Add a course to a semester, creating the semester if needed
    AddCourse {
        #[arg(long)]
        nim: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        credits: i32,
        #[arg(long)]
        score: Option<f64>,
    },
    /// Set or clear (omit --score) a course score
    SetScore {
        #[arg(long)]
        course_id: Uuid,
        #[arg(long)]
        score: Option<f64>,
    },
    /// Remove one course
    DeleteCourse {
        #[arg(long)]
        course_id: Uuid,
    },
    /// Remove a student and all of their semesters
    DeleteStudent {
        #[arg(long)]
        nim: String,
    },
    /// List students with IPK and credits, optionally exporting CSV
    Roster {
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// IPK distribution and rankings
    Analytics {
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.settings.as_deref())?;
    if settings.grade_scale.is_empty() {
        warn!("grade scale is empty; every graded course resolves to E");
    }
    let scale = settings.grade_scale.as_slice();

    match cli.command {
        Commands::Grade { score } => {
            let details = grade::resolve_grade(score, scale);
            println!("{} (point {:.2})", details.letter, details.point);
        }
        Commands::Scale => {
            for entry in scale {
                println!(
                    ">= {:>5.1}  {:<2} {:.2}",
                    entry.min_score, entry.details.letter, entry.details.point
                );
            }
            println!("Target credits: {}", settings.target_sks);
        }
        command => {
            let pool = connect().await?;
            run_with_store(&pool, &settings, command).await?;
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    info!("connected to Postgres");
    Ok(pool)
}

async fn run_with_store(
    pool: &PgPool,
    settings: &Settings,
    command: Commands,
) -> anyhow::Result<()> {
    let scale = settings.grade_scale.as_slice();

    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(pool, scale).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(pool, &csv, scale).await?;
            println!("Inserted {inserted} courses from {}.", csv.display());
        }
        Commands::Summary { nim, json } => {
            let record = db::fetch_student(pool, &nim)
                .await?
                .with_context(|| format!("no student with NIM {nim}"))?;
            let summary = academic::compute_academic_data(&record.semesters, scale);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("{} ({})", record.profile.name, record.profile.nim);
            println!(
                "IPK {} ({})",
                report::format_gpa(summary.ipk),
                grade::letter_for_point(summary.ipk, scale)
            );
            println!(
                "Last IPS {}",
                report::format_gpa(academic::last_ips(&summary.processed_semesters))
            );
            println!(
                "Credits {} / {} ({:.1}%)",
                summary.total_credits,
                settings.target_sks,
                academic::credit_progress(summary.total_credits, settings.target_sks)
            );
            println!("Quality points {:.2}", summary.total_quality_points);

            if summary.ipk_progression.is_empty() {
                println!("No semesters recorded.");
            } else {
                println!("IPK progression:");
                for (point, processed) in summary
                    .ipk_progression
                    .iter()
                    .zip(summary.processed_semesters.iter())
                {
                    println!(
                        "- {}: IPS {} over {} credits, IPK {}",
                        point.semester_name,
                        report::format_gpa(processed.semester.ips),
                        processed.semester_credits,
                        report::format_gpa(point.ipk)
                    );
                }
            }
        }
        Commands::Transcript { nim, out } => {
            let record = db::fetch_student(pool, &nim)
                .await?
                .with_context(|| format!("no student with NIM {nim}"))?;
            let summary = academic::compute_academic_data(&record.semesters, scale);
            let transcript = report::build_transcript(&record, &summary, scale);
            let out = out
                .unwrap_or_else(|| PathBuf::from(report::transcript_file_name(&record.profile)));
            std::fs::write(&out, transcript)?;
            println!("Transcript written to {}.", out.display());
        }
        Commands::UpdateProfile {
            nim,
            advisor_name,
            advisor_nip,
            place_and_date,
        } => {
            let info = AdvisorInfo {
                advisor_name,
                advisor_nip,
                transcript_place_and_date: place_and_date,
            };
            if db::update_advisor_info(pool, &nim, info).await? {
                println!("Profile of {nim} updated.");
            } else {
                println!("No student with NIM {nim}.");
            }
        }
        Commands::AddSemester { nim, name } => {
            let id = db::add_semester(pool, &nim, &name).await?;
            println!("Semester {name} ready ({id}).");
        }
        Commands::DeleteSemester { nim, name } => {
            if db::delete_semester(pool, &nim, &name, scale).await? {
                println!("Semester {name} of {nim} deleted.");
            } else {
                println!("No semester {name} for NIM {nim}.");
            }
        }
        Commands::AddCourse {
            nim,
            semester,
            name,
            credits,
            score,
        } => {
            let course = NewCourse {
                name,
                credits,
                score,
            };
            let id = db::add_course(pool, &nim, &semester, &course, scale).await?;
            println!("Added {} to {semester} ({id}).", course.name);
        }
        Commands::SetScore { course_id, score } => {
            if db::set_score(pool, course_id, score, scale).await? {
                println!("Score updated.");
            } else {
                println!("No course with id {course_id}.");
            }
        }
        Commands::DeleteCourse { course_id } => {
            if db::delete_course(pool, course_id, scale).await? {
                println!("Course deleted.");
            } else {
                println!("No course with id {course_id}.");
            }
        }
        Commands::DeleteStudent { nim } => {
            if db::delete_student(pool, &nim).await? {
                println!("Student {nim} deleted.");
            } else {
                println!("No student with NIM {nim}.");
            }
        }
        Commands::Roster { year, search, out } => {
            let records = db::fetch_students(pool).await?;
            let filter = analytics::RosterFilter {
                class_year: year,
                major: None,
                search,
            };
            let standings = analytics::standings(&records, scale, &filter);

            if standings.is_empty() {
                println!("No students match this filter.");
                return Ok(());
            }

            println!("Class years: {}", analytics::class_years(&records).join(", "));
            for standing in standings.iter() {
                let edited = standing
                    .last_admin_edit
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "- {} ({}, {}, {}) IPK {} with {} credits [{}] last admin edit {}",
                    standing.name,
                    standing.nim,
                    standing.major,
                    standing.class_year,
                    report::format_gpa(standing.ipk),
                    standing.total_credits,
                    analytics::GpaIndicator::from_ipk(standing.ipk).as_str(),
                    edited
                );
            }

            if let Some(out) = out {
                let path = if out.is_dir() {
                    out.join(report::roster_file_name(&filter.label(), Utc::now().date_naive()))
                } else {
                    out
                };
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report::write_roster_csv(file, &standings)?;
                println!("Roster exported to {}.", path.display());
            }
        }
        Commands::Analytics { year, major, out } => {
            let records = db::fetch_students(pool).await?;
            let filter = analytics::RosterFilter {
                class_year: year,
                major,
                search: None,
            };
            let standings = analytics::standings(&records, scale, &filter);
            let text = report::build_analytics_report(&filter.label(), &standings);

            match out {
                Some(out) => {
                    std::fs::write(&out, text)?;
                    println!("Analytics written to {}.", out.display());
                }
                None => {
                    println!("Majors: {}", analytics::majors(&records).join(", "));
                    print!("{text}");
                }
            }
        }
        Commands::Grade { .. } | Commands::Scale => {}
    }

    Ok(())
}
