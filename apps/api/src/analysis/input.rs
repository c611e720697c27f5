use crate::analysis::errors::AnalysisError;

pub const MIN_RESUME_CHARS: usize = 100;
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;

/// A resume/job-description pair that has passed the minimum-length checks.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    resume_text: String,
    job_description: String,
}

impl AnalysisInput {
    pub fn new(
        resume_text: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Result<Self, AnalysisError> {
        let resume_text = resume_text.into();
        let job_description = job_description.into();

        check_length("resumeText", &resume_text, MIN_RESUME_CHARS)?;
        check_length("jobDescription", &job_description, MIN_JOB_DESCRIPTION_CHARS)?;

        Ok(Self {
            resume_text,
            job_description,
        })
    }

    pub fn resume_text(&self) -> &str {
        &self.resume_text
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }
}

fn check_length(field: &'static str, text: &str, min: usize) -> Result<(), AnalysisError> {
    let actual = text.chars().count();
    if actual < min {
        return Err(AnalysisError::InputTooShort { field, min, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_minimum_lengths() {
        let input = AnalysisInput::new("r".repeat(100), "j".repeat(50)).unwrap();
        assert_eq!(input.resume_text().len(), 100);
        assert_eq!(input.job_description().len(), 50);
    }

    #[test]
    fn test_rejects_short_resume() {
        let err = AnalysisInput::new("r".repeat(99), "j".repeat(50)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InputTooShort {
                field: "resumeText",
                min: 100,
                actual: 99
            }
        ));
    }

    #[test]
    fn test_rejects_short_job_description() {
        let err = AnalysisInput::new("r".repeat(120), "j".repeat(10)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InputTooShort {
                field: "jobDescription",
                ..
            }
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 99 two-byte characters is still too short.
        assert!(AnalysisInput::new("é".repeat(99), "j".repeat(50)).is_err());
    }
}
