use crate::models::{GradeColor, GradeDetails, GradeScaleEntry};

const FAILING_LETTER: &str = "E";
const NO_GRADE_LETTER: &str = "-";

/// Default scale used when no settings file provides one.
///
/// | Min score | Letter | Point |
/// |-----------|--------|-------|
/// | 86        | A      | 4.0   |
/// | 71        | B      | 3.0   |
/// | 56        | C      | 2.0   |
/// | 40        | D      | 1.0   |
/// | 0         | E      | 0.0   |
pub fn default_scale() -> Vec<GradeScaleEntry> {
    [(86.0, "A", 4.0), (71.0, "B", 3.0), (56.0, "C", 2.0), (40.0, "D", 1.0), (0.0, "E", 0.0)]
        .into_iter()
        .map(|(min_score, letter, point)| GradeScaleEntry {
            min_score,
            details: GradeDetails {
                letter: letter.to_string(),
                point,
                color: color_for_letter(letter),
            },
        })
        .collect()
}

/// Returns true when a score can be resolved against a scale.
pub fn is_gradable(score: Option<f64>) -> bool {
    matches!(score, Some(value) if value.is_finite() && (0.0..=100.0).contains(&value))
}

pub fn no_grade() -> GradeDetails {
    GradeDetails {
        letter: NO_GRADE_LETTER.to_string(),
        point: 0.0,
        color: GradeColor::Gray,
    }
}

pub fn failing_grade() -> GradeDetails {
    GradeDetails {
        letter: FAILING_LETTER.to_string(),
        point: 0.0,
        color: GradeColor::Red,
    }
}

/// Resolves a score to the entry with the greatest `min_score` not above it.
///
/// Entry order does not matter. Ungraded or out-of-range scores get the
/// `-` sentinel; scores below every threshold get the failing grade.
pub fn resolve_grade(score: Option<f64>, scale: &[GradeScaleEntry]) -> GradeDetails {
    let value = match score {
        Some(value) if is_gradable(score) => value,
        _ => return no_grade(),
    };

    scale
        .iter()
        .filter(|entry| entry.min_score <= value)
        .max_by(|a, b| {
            a.min_score
                .partial_cmp(&b.min_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|entry| entry.details.clone())
        .unwrap_or_else(failing_grade)
}

/// Reverse lookup from a grade point to a letter.
///
/// Only an exact point match yields a letter; anything in between is `?`.
pub fn letter_for_point(point: Option<f64>, scale: &[GradeScaleEntry]) -> String {
    let value = match point {
        Some(value) if (0.0..=4.0).contains(&value) => value,
        _ => return NO_GRADE_LETTER.to_string(),
    };

    let closest = scale.iter().min_by(|a, b| {
        let da = (a.details.point - value).abs();
        let db = (b.details.point - value).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    match closest {
        Some(entry) if entry.details.point == value => entry.details.letter.clone(),
        Some(_) => "?".to_string(),
        None => NO_GRADE_LETTER.to_string(),
    }
}

pub fn color_for_letter(letter: &str) -> GradeColor {
    match letter.trim().to_ascii_uppercase().as_str() {
        "A" => GradeColor::Green,
        "B" => GradeColor::Blue,
        "C" => GradeColor::Yellow,
        "D" => GradeColor::Orange,
        _ => GradeColor::Red,
    }
}

/// Cleans an edited scale before it is stored or used.
pub fn sanitize_scale(entries: Vec<GradeScaleEntry>) -> Vec<GradeScaleEntry> {
    let mut cleaned: Vec<GradeScaleEntry> = entries
        .into_iter()
        .filter(|entry| !entry.details.letter.trim().is_empty())
        .map(|entry| {
            let letter = entry.details.letter.trim().to_uppercase();
            GradeScaleEntry {
                min_score: finite_or_zero(entry.min_score),
                details: GradeDetails {
                    color: color_for_letter(&letter),
                    point: finite_or_zero(entry.details.point),
                    letter,
                },
            }
        })
        .collect();

    cleaned.sort_by(|a, b| {
        b.min_score
            .partial_cmp(&a.min_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    cleaned
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(min_score: f64, letter: &str, point: f64) -> GradeScaleEntry {
        GradeScaleEntry {
            min_score,
            details: GradeDetails {
                letter: letter.to_string(),
                point,
                color: color_for_letter(letter),
            },
        }
    }

    #[test]
    fn boundaries_are_inclusive() {
        let scale = default_scale();
        assert_eq!(resolve_grade(Some(86.0), &scale).letter, "A");
        assert_eq!(resolve_grade(Some(85.99), &scale).letter, "B");
        assert_eq!(resolve_grade(Some(71.0), &scale).letter, "B");
        assert_eq!(resolve_grade(Some(56.0), &scale).letter, "C");
        assert_eq!(resolve_grade(Some(40.0), &scale).letter, "D");
        assert_eq!(resolve_grade(Some(39.9), &scale).letter, "E");
        assert_eq!(resolve_grade(Some(0.0), &scale).letter, "E");
        assert_eq!(resolve_grade(Some(100.0), &scale).point, 4.0);
    }

    #[test]
    fn unordered_scale_picks_greatest_threshold() {
        let scale = vec![entry(0.0, "E", 0.0), entry(71.0, "B", 3.0), entry(86.0, "A", 4.0)];
        assert_eq!(resolve_grade(Some(90.0), &scale).letter, "A");
        assert_eq!(resolve_grade(Some(75.0), &scale).letter, "B");
        assert_eq!(resolve_grade(Some(10.0), &scale).letter, "E");
    }

    #[test]
    fn every_score_resolves_to_greatest_qualifying_threshold() {
        let scale = default_scale();
        for tenths in 0..=1000 {
            let score = tenths as f64 / 10.0;
            let grade = resolve_grade(Some(score), &scale);
            let best = scale
                .iter()
                .filter(|e| e.min_score <= score)
                .map(|e| e.min_score)
                .fold(f64::MIN, f64::max);
            let chosen = scale
                .iter()
                .find(|e| e.details.letter == grade.letter)
                .map(|e| e.min_score);
            assert_eq!(chosen, Some(best), "score {score}");
        }
    }

    #[test]
    fn ungraded_and_invalid_scores_get_sentinel() {
        let scale = default_scale();
        for score in [None, Some(-1.0), Some(100.5), Some(f64::NAN), Some(f64::INFINITY)] {
            let grade = resolve_grade(score, &scale);
            assert_eq!(grade.letter, "-");
            assert_eq!(grade.point, 0.0);
            assert_eq!(grade.color, GradeColor::Gray);
        }
    }

    #[test]
    fn below_lowest_threshold_and_empty_scale_fail_safely() {
        let scale = vec![entry(86.0, "A", 4.0), entry(71.0, "B", 3.0)];
        assert_eq!(resolve_grade(Some(50.0), &scale), failing_grade());
        assert_eq!(resolve_grade(Some(50.0), &[]), failing_grade());
    }

    #[test]
    fn letter_for_point_requires_exact_match() {
        let scale = default_scale();
        assert_eq!(letter_for_point(Some(3.0), &scale), "B");
        assert_eq!(letter_for_point(Some(3.4), &scale), "?");
        assert_eq!(letter_for_point(None, &scale), "-");
        assert_eq!(letter_for_point(Some(4.5), &scale), "-");
        assert_eq!(letter_for_point(Some(2.0), &[]), "-");
    }

    #[test]
    fn sanitize_drops_blank_letters_and_sorts_descending() {
        let cleaned = sanitize_scale(vec![
            entry(40.0, " d ", 1.0),
            entry(50.0, "  ", 2.0),
            entry(f64::NAN, "e", f64::NAN),
            entry(86.0, "a", 4.0),
        ]);
        let letters: Vec<&str> = cleaned.iter().map(|e| e.details.letter.as_str()).collect();
        assert_eq!(letters, vec!["A", "D", "E"]);
        assert_eq!(cleaned[1].details.color, GradeColor::Orange);
        assert_eq!(cleaned[2].min_score, 0.0);
        assert_eq!(cleaned[2].details.point, 0.0);
    }
}
