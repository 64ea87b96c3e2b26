use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("course name must not be empty")]
    EmptyCourseName,

    #[error("semester name must not be empty")]
    EmptySemesterName,

    #[error("credits must be positive, got {0}")]
    NonPositiveCredits(i32),

    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(f64),

    #[error("no profile field to update")]
    EmptyProfileUpdate,
}

/// A course as entered by a user, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub name: String,
    pub credits: i32,
    pub score: Option<f64>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.name.trim().is_empty() {
            return Err(InputError::EmptyCourseName);
        }
        if self.credits <= 0 {
            return Err(InputError::NonPositiveCredits(self.credits));
        }
        validate_score(self.score)
    }
}

pub fn validate_score(score: Option<f64>) -> Result<(), InputError> {
    match score {
        Some(value) if !(value.is_finite() && (0.0..=100.0).contains(&value)) => {
            Err(InputError::ScoreOutOfRange(value))
        }
        _ => Ok(()),
    }
}

pub fn validate_semester_name(name: &str) -> Result<(), InputError> {
    if name.trim().is_empty() {
        Err(InputError::EmptySemesterName)
    } else {
        Ok(())
    }
}

/// Transcript signature fields. `None` leaves a field unchanged; a blank
/// value clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvisorInfo {
    pub advisor_name: Option<String>,
    pub advisor_nip: Option<String>,
    pub transcript_place_and_date: Option<String>,
}

impl AdvisorInfo {
    /// Trims every provided field and rejects an update that touches nothing.
    pub fn normalized(self) -> Result<Self, InputError> {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        let info = Self {
            advisor_name: trim(self.advisor_name),
            advisor_nip: trim(self.advisor_nip),
            transcript_place_and_date: trim(self.transcript_place_and_date),
        };
        if info.advisor_name.is_none()
            && info.advisor_nip.is_none()
            && info.transcript_place_and_date.is_none()
        {
            return Err(InputError::EmptyProfileUpdate);
        }
        Ok(info)
    }
}
