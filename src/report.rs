use std::fmt::Write;

use chrono::NaiveDate;

use crate::academic;
use crate::analytics::{self, GpaBand, GpaDistribution, GpaIndicator};
use crate::grade;
use crate::models::{
    AcademicSummary, GradeScaleEntry, StudentProfile, StudentRecord, StudentStanding,
};

const PLACE_AND_DATE_PLACEHOLDER: &str = "(Place, Day Month Year)";
const ADVISOR_PLACEHOLDER: &str = "(_________________________)";

pub fn format_gpa(value: Option<f64>) -> String {
    value.map_or_else(|| "-.--".to_string(), |v| format!("{v:.2}"))
}

pub fn transcript_file_name(profile: &StudentProfile) -> String {
    let name: String = profile
        .name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("transcript_{}_{}.md", profile.nim, name)
}

pub fn build_transcript(
    record: &StudentRecord,
    summary: &AcademicSummary,
    scale: &[GradeScaleEntry],
) -> String {
    let profile = &record.profile;
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Transcript");
    let _ = writeln!(output);
    let _ = writeln!(output, "- Name: {}", profile.name);
    let _ = writeln!(output, "- NIM: {}", profile.nim);
    let _ = writeln!(output, "- Major: {}", profile.major);
    let _ = writeln!(output, "- Class year: {}", profile.class_year);

    if summary.processed_semesters.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No grade data to display yet.");
    }

    for processed in summary.processed_semesters.iter() {
        let semester = &processed.semester;
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", semester.name);
        let _ = writeln!(output);

        let graded: Vec<_> = semester
            .courses
            .iter()
            .filter(|course| academic::is_graded(course))
            .collect();

        if graded.is_empty() {
            let _ = writeln!(output, "No grades for this semester.");
            continue;
        }

        let _ = writeln!(
            output,
            "| Course | Credits | Score | Letter | Point | Quality points |"
        );
        let _ = writeln!(output, "|---|---:|---:|:---:|---:|---:|");
        for course in graded {
            let details = grade::resolve_grade(course.score, scale);
            let quality_points = details.point * course.credits as f64;
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {:.2} | {:.2} |",
                course.name,
                course.credits,
                course.score.map(|s| s.to_string()).unwrap_or_default(),
                details.letter,
                details.point,
                quality_points
            );
        }
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "IPS {} ({}) over {} credits",
            format_gpa(semester.ips),
            grade::letter_for_point(semester.ips, scale),
            processed.semester_credits
        );
    }

    if !summary.processed_semesters.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Summary");
        let _ = writeln!(output, "- Total credits taken: {}", summary.total_credits);
        let _ = writeln!(output, "- Cumulative GPA (IPK): {}", format_gpa(summary.ipk));
    }

    let place_and_date = non_blank(profile.transcript_place_and_date.as_deref())
        .unwrap_or(PLACE_AND_DATE_PLACEHOLDER);
    let advisor_name = non_blank(profile.advisor_name.as_deref()).unwrap_or(ADVISOR_PLACEHOLDER);
    let advisor_nip = non_blank(profile.advisor_nip.as_deref())
        .map(|nip| format!("NIP. {nip}"))
        .unwrap_or_else(|| "NIP. ".to_string());

    let _ = writeln!(output);
    let _ = writeln!(output, "{place_and_date}");
    let _ = writeln!(output, "Academic Advisor,");
    let _ = writeln!(output);
    let _ = writeln!(output);
    let _ = writeln!(output, "**{advisor_name}**");
    let _ = writeln!(output, "{advisor_nip}");

    output
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn build_analytics_report(label: &str, standings: &[StudentStanding]) -> String {
    let distribution = GpaDistribution::from_standings(standings);
    let total = distribution.total();
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Analytics");
    let _ = writeln!(
        output,
        "Generated for {} ({} students with an IPK)",
        label, total
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## IPK Distribution");

    if total == 0 {
        let _ = writeln!(output, "No students with grades for this selection.");
    } else {
        let max_count = distribution.max_count().max(1);
        for band in GpaBand::ALL {
            let count = distribution.count(band);
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%) {}",
                band.label(),
                count,
                count as f64 / total as f64 * 100.0,
                "#".repeat(count * 20 / max_count)
            );
        }
    }

    write_ranking(
        &mut output,
        "Top 5 (IPK)",
        &analytics::top_students(standings, analytics::RANKING_SIZE),
    );
    write_ranking(
        &mut output,
        "Bottom 5 (IPK)",
        &analytics::bottom_students(standings, analytics::RANKING_SIZE),
    );

    output
}

fn write_ranking(output: &mut String, title: &str, ranked: &[StudentStanding]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");

    if ranked.is_empty() {
        let _ = writeln!(output, "No data.");
        return;
    }

    let _ = writeln!(output, "| # | Name | NIM | IPK |");
    let _ = writeln!(output, "|---:|---|---|---:|");
    for (rank, standing) in ranked.iter().enumerate() {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            rank + 1,
            standing.name,
            standing.nim,
            format_gpa(standing.ipk)
        );
    }
}

pub fn roster_file_name(label: &str, date: NaiveDate) -> String {
    format!("roster_{}_{}.csv", label, date.format("%Y-%m-%d"))
}

#[derive(serde::Serialize)]
struct RosterRow<'a> {
    name: &'a str,
    nim: &'a str,
    email: &'a str,
    major: &'a str,
    class_year: &'a str,
    ipk: String,
    total_credits: i32,
    status: &'static str,
}

pub fn write_roster_csv<W: std::io::Write>(
    writer: W,
    standings: &[StudentStanding],
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for standing in standings {
        csv_writer.serialize(RosterRow {
            name: &standing.name,
            nim: &standing.nim,
            email: &standing.email,
            major: &standing.major,
            class_year: &standing.class_year,
            ipk: standing
                .ipk
                .map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}")),
            total_credits: standing.total_credits,
            status: GpaIndicator::from_ipk(standing.ipk).as_str(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
