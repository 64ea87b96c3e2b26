use crate::grade;
use crate::models::{
    AcademicSummary, Course, GradeScaleEntry, ProcessedSemester, ProgressionPoint, Semester,
    SemesterTotals,
};

/// A course counts toward averages only with a resolvable score and positive credits.
pub fn is_graded(course: &Course) -> bool {
    course.credits > 0 && grade::is_gradable(course.score)
}

pub fn compute_semester(courses: &[Course], scale: &[GradeScaleEntry]) -> SemesterTotals {
    let mut totals = SemesterTotals::default();

    for course in courses.iter().filter(|course| is_graded(course)) {
        let details = grade::resolve_grade(course.score, scale);
        totals.semester_credits += course.credits;
        totals.semester_quality_points += details.point * course.credits as f64;
        totals.graded_courses += 1;
    }

    totals.ips = if totals.semester_credits > 0 {
        Some(totals.semester_quality_points / totals.semester_credits as f64)
    } else {
        None
    };
    totals
}

/// Aggregates semesters in the order given.
///
/// The progression series holds one point per semester. A semester without
/// graded courses repeats the previous cumulative IPK (or `None` before the
/// first graded semester). Totals are exact sums and do not depend on order.
pub fn compute_academic_data(semesters: &[Semester], scale: &[GradeScaleEntry]) -> AcademicSummary {
    let mut total_credits: i32 = 0;
    let mut total_quality_points = 0.0;
    let mut cumulative_credits: i32 = 0;
    let mut cumulative_quality_points = 0.0;
    let mut ipk_progression: Vec<ProgressionPoint> = Vec::with_capacity(semesters.len());
    let mut processed_semesters = Vec::with_capacity(semesters.len());

    for semester in semesters {
        let totals = compute_semester(&semester.courses, scale);
        total_credits += totals.semester_credits;
        total_quality_points += totals.semester_quality_points;

        let ipk = if totals.graded_courses > 0 {
            cumulative_credits += totals.semester_credits;
            cumulative_quality_points += totals.semester_quality_points;
            Some(cumulative_quality_points / cumulative_credits as f64)
        } else {
            ipk_progression.last().and_then(|point| point.ipk)
        };
        ipk_progression.push(ProgressionPoint {
            semester_name: semester.name.clone(),
            ipk,
        });

        processed_semesters.push(ProcessedSemester {
            semester: Semester {
                ips: totals.ips,
                ..semester.clone()
            },
            semester_credits: totals.semester_credits,
            semester_quality_points: totals.semester_quality_points,
        });
    }

    let ipk = if total_credits > 0 {
        Some(total_quality_points / total_credits as f64)
    } else {
        None
    };

    AcademicSummary {
        ipk,
        total_credits,
        total_quality_points,
        ipk_progression,
        processed_semesters,
    }
}

/// Recomputes the cached IPS of each semester. Call after every course write.
pub fn refresh_ips(semesters: &mut [Semester], scale: &[GradeScaleEntry]) {
    for semester in semesters.iter_mut() {
        semester.ips = compute_semester(&semester.courses, scale).ips;
    }
}

pub fn last_ips(processed: &[ProcessedSemester]) -> Option<f64> {
    processed.iter().rev().find_map(|entry| entry.semester.ips)
}

pub fn credit_progress(total_credits: i32, target_sks: i32) -> f64 {
    if target_sks > 0 {
        total_credits as f64 / target_sks as f64 * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn course(credits: i32, score: Option<f64>) -> Course {
        Course {
            id: Uuid::new_v4(),
            name: "Kalkulus".to_string(),
            credits,
            score,
        }
    }

    fn semester(name: &str, courses: Vec<Course>) -> Semester {
        Semester {
            id: Uuid::new_v4(),
            name: name.to_string(),
            courses,
            ips: None,
        }
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("expected a value");
        assert!((value - expected).abs() < 1e-9, "{value} != {expected}");
    }

    #[test]
    fn ungraded_course_is_not_averaged() {
        let scale = grade::default_scale();
        let totals = compute_semester(&[course(3, None), course(4, Some(100.0))], &scale);
        assert_eq!(totals.ips, Some(4.0));
        assert_eq!(totals.semester_credits, 4);
        assert_eq!(totals.graded_courses, 1);
    }

    #[test]
    fn zero_credit_and_out_of_range_courses_contribute_nothing() {
        let scale = grade::default_scale();
        let totals = compute_semester(
            &[course(0, Some(90.0)), course(-2, Some(90.0)), course(3, Some(140.0))],
            &scale,
        );
        assert_eq!(totals.ips, None);
        assert_eq!(totals.semester_credits, 0);
        assert_eq!(totals.semester_quality_points, 0.0);
    }

    #[test]
    fn empty_input_yields_null_ipk() {
        let summary = compute_academic_data(&[], &grade::default_scale());
        assert_eq!(summary.ipk, None);
        assert_eq!(summary.total_credits, 0);
        assert!(summary.ipk_progression.is_empty());
        assert!(summary.processed_semesters.is_empty());
    }

    #[test]
    fn ungraded_semester_carries_progression_forward() {
        let scale = grade::default_scale();
        let semesters = vec![
            semester("Semester 1", vec![course(4, Some(80.0))]),
            semester("Semester 2", vec![course(3, None)]),
            semester("Semester 3", vec![course(4, Some(100.0))]),
        ];
        let summary = compute_academic_data(&semesters, &scale);

        let names: Vec<&str> = summary
            .ipk_progression
            .iter()
            .map(|p| p.semester_name.as_str())
            .collect();
        assert_eq!(names, vec!["Semester 1", "Semester 2", "Semester 3"]);
        assert_close(summary.ipk_progression[0].ipk, 3.0);
        assert_close(summary.ipk_progression[1].ipk, 3.0);
        assert_close(summary.ipk_progression[2].ipk, 3.5);
        assert_close(summary.ipk, 3.5);
        assert_eq!(summary.total_credits, 8);
        assert_eq!(summary.total_quality_points, 28.0);
        assert_eq!(summary.processed_semesters[1].semester.ips, None);
        assert_eq!(summary.processed_semesters[1].semester_credits, 0);
    }

    #[test]
    fn leading_ungraded_semester_has_null_progression() {
        let scale = grade::default_scale();
        let semesters = vec![
            semester("Semester 1", vec![]),
            semester("Semester 2", vec![course(2, Some(60.0))]),
        ];
        let summary = compute_academic_data(&semesters, &scale);
        assert_eq!(summary.ipk_progression[0].ipk, None);
        assert_close(summary.ipk_progression[1].ipk, 2.0);
    }

    #[test]
    fn reordering_changes_progression_but_not_totals() {
        let scale = grade::default_scale();
        let first = semester("Ganjil", vec![course(3, Some(90.0)), course(2, Some(60.0))]);
        let second = semester("Genap", vec![course(4, Some(45.0))]);

        let forward = compute_academic_data(&[first.clone(), second.clone()], &scale);
        let reversed = compute_academic_data(&[second, first], &scale);

        assert_eq!(forward.total_credits, reversed.total_credits);
        assert_close(forward.ipk, reversed.ipk.unwrap_or_default());
        assert_ne!(forward.ipk_progression, reversed.ipk_progression);
    }

    #[test]
    fn repeated_computation_is_identical_and_leaves_input_alone() {
        let scale = grade::default_scale();
        let semesters = vec![semester("Semester 1", vec![course(3, Some(75.0))])];
        let snapshot = semesters.clone();

        let once = compute_academic_data(&semesters, &scale);
        let twice = compute_academic_data(&semesters, &scale);

        assert_eq!(once, twice);
        assert_eq!(semesters, snapshot);
        assert_eq!(once.processed_semesters[0].semester.ips, Some(3.0));
    }

    #[test]
    fn summary_serializes_with_flattened_semesters() {
        let scale = grade::default_scale();
        let semesters = vec![semester("Semester 1", vec![course(3, Some(75.0))])];
        let summary = compute_academic_data(&semesters, &scale);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["ipk"], 3.0);
        assert_eq!(value["total_quality_points"], 9.0);
        assert_eq!(value["ipk_progression"][0]["semester_name"], "Semester 1");
        let first = &value["processed_semesters"][0];
        assert_eq!(first["name"], "Semester 1");
        assert_eq!(first["semester_credits"], 3);
        assert_eq!(first["ips"], 3.0);
    }

    #[test]
    fn refresh_ips_updates_cached_values() {
        let scale = grade::default_scale();
        let mut semesters = vec![
            semester("Semester 1", vec![course(2, Some(90.0)), course(2, Some(60.0))]),
            semester("Semester 2", vec![course(2, None)]),
        ];
        semesters[1].ips = Some(1.0);

        refresh_ips(&mut semesters, &scale);

        assert_close(semesters[0].ips, 3.0);
        assert_eq!(semesters[1].ips, None);
    }

    #[test]
    fn last_ips_skips_trailing_ungraded_semesters() {
        let scale = grade::default_scale();
        let semesters = vec![
            semester("Semester 1", vec![course(2, Some(75.0))]),
            semester("Semester 2", vec![course(2, None)]),
        ];
        let summary = compute_academic_data(&semesters, &scale);
        assert_eq!(last_ips(&summary.processed_semesters), Some(3.0));
        assert_eq!(last_ips(&[]), None);
    }

    #[test]
    fn credit_progress_handles_missing_target() {
        assert_eq!(credit_progress(72, 144), 50.0);
        assert_eq!(credit_progress(72, 0), 0.0);
    }
}
