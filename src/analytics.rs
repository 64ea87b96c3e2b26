use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::academic;
use crate::models::{GradeScaleEntry, Role, StudentRecord, StudentStanding};

pub const RANKING_SIZE: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct RosterFilter {
    pub class_year: Option<String>,
    pub major: Option<String>,
    pub search: Option<String>,
}

impl RosterFilter {
    pub fn matches(&self, standing: &StudentStanding) -> bool {
        let year_ok = self
            .class_year
            .as_deref()
            .map_or(true, |year| standing.class_year == year);
        let major_ok = self
            .major
            .as_deref()
            .map_or(true, |major| standing.major == major);
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                standing.name.to_lowercase().contains(&query)
                    || standing.nim.to_lowercase().contains(&query)
            }
        };
        year_ok && major_ok && search_ok
    }

    pub fn label(&self) -> String {
        let parts: Vec<&str> = [self.class_year.as_deref(), self.major.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("-")
        }
    }
}

pub fn standing_for(record: &StudentRecord, scale: &[GradeScaleEntry]) -> StudentStanding {
    let summary = academic::compute_academic_data(&record.semesters, scale);
    StudentStanding {
        name: record.profile.name.clone(),
        nim: record.profile.nim.clone(),
        email: record.profile.email.clone(),
        major: record.profile.major.clone(),
        class_year: record.profile.class_year.clone(),
        ipk: summary.ipk,
        total_credits: summary.total_credits,
        last_admin_edit: record.last_admin_edit,
    }
}

/// Standings for every student that passes the filter. Admin accounts are skipped.
pub fn standings(
    records: &[StudentRecord],
    scale: &[GradeScaleEntry],
    filter: &RosterFilter,
) -> Vec<StudentStanding> {
    records
        .iter()
        .filter(|record| record.profile.role == Role::Student)
        .map(|record| standing_for(record, scale))
        .filter(|standing| filter.matches(standing))
        .collect()
}

pub fn class_years(records: &[StudentRecord]) -> Vec<String> {
    let years: BTreeSet<&str> = records
        .iter()
        .map(|record| record.profile.class_year.as_str())
        .filter(|year| !year.is_empty())
        .collect();
    years.into_iter().rev().map(str::to_string).collect()
}

pub fn majors(records: &[StudentRecord]) -> Vec<String> {
    let majors: BTreeSet<&str> = records
        .iter()
        .map(|record| record.profile.major.as_str())
        .filter(|major| !major.is_empty())
        .collect();
    majors.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpaBand {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
}

impl GpaBand {
    pub const ALL: [GpaBand; 4] = [
        GpaBand::Excellent,
        GpaBand::Good,
        GpaBand::Fair,
        GpaBand::NeedsAttention,
    ];

    pub fn from_ipk(ipk: f64) -> Self {
        match ipk {
            v if v >= 3.5 => GpaBand::Excellent,
            v if v >= 3.0 => GpaBand::Good,
            v if v >= 2.5 => GpaBand::Fair,
            _ => GpaBand::NeedsAttention,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GpaBand::Excellent => ">= 3.50 (Excellent)",
            GpaBand::Good => "3.00 - 3.49 (Good)",
            GpaBand::Fair => "2.50 - 2.99 (Fair)",
            GpaBand::NeedsAttention => "< 2.50 (Needs attention)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpaDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub needs_attention: usize,
}

impl GpaDistribution {
    /// Counts students by band. Students without an IPK are not counted.
    pub fn from_standings(standings: &[StudentStanding]) -> Self {
        let mut distribution = GpaDistribution::default();
        for ipk in standings.iter().filter_map(|s| s.ipk) {
            match GpaBand::from_ipk(ipk) {
                GpaBand::Excellent => distribution.excellent += 1,
                GpaBand::Good => distribution.good += 1,
                GpaBand::Fair => distribution.fair += 1,
                GpaBand::NeedsAttention => distribution.needs_attention += 1,
            }
        }
        distribution
    }

    pub fn count(&self, band: GpaBand) -> usize {
        match band {
            GpaBand::Excellent => self.excellent,
            GpaBand::Good => self.good,
            GpaBand::Fair => self.fair,
            GpaBand::NeedsAttention => self.needs_attention,
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.fair + self.needs_attention
    }

    pub fn max_count(&self) -> usize {
        GpaBand::ALL
            .iter()
            .map(|band| self.count(*band))
            .max()
            .unwrap_or(0)
    }
}

/// Roster status dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpaIndicator {
    NoData,
    OnTrack,
    Watch,
    AtRisk,
}

impl GpaIndicator {
    pub fn from_ipk(ipk: Option<f64>) -> Self {
        match ipk {
            None => GpaIndicator::NoData,
            Some(v) if v > 3.0 => GpaIndicator::OnTrack,
            Some(v) if v >= 2.5 => GpaIndicator::Watch,
            Some(_) => GpaIndicator::AtRisk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GpaIndicator::NoData => "no data",
            GpaIndicator::OnTrack => "on track",
            GpaIndicator::Watch => "watch",
            GpaIndicator::AtRisk => "at risk",
        }
    }
}

pub fn top_students(standings: &[StudentStanding], limit: usize) -> Vec<StudentStanding> {
    let mut ranked: Vec<StudentStanding> = standings
        .iter()
        .filter(|s| s.ipk.is_some())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| compare_ipk(b, a));
    ranked.truncate(limit);
    ranked
}

pub fn bottom_students(standings: &[StudentStanding], limit: usize) -> Vec<StudentStanding> {
    let mut ranked: Vec<StudentStanding> = standings
        .iter()
        .filter(|s| s.ipk.is_some())
        .cloned()
        .collect();
    ranked.sort_by(compare_ipk);
    ranked.truncate(limit);
    ranked
}

fn compare_ipk(a: &StudentStanding, b: &StudentStanding) -> Ordering {
    a.ipk.partial_cmp(&b.ipk).unwrap_or(Ordering::Equal)
}
