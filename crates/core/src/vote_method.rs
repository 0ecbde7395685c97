//! Rules attached to each vote method.

use jury_common::{AppError, AppResult};
pub use jury_db::entities::round::VoteMethod;

const RATING_VALUES: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];
const YESNO_VALUES: [f64; 2] = [0.0, 1.0];

/// Validation and aggregation behavior of a [`VoteMethod`].
pub trait VoteRules: Copy {
    /// Check one submitted value. `eligible_entries` is the number of
    /// non-disqualified entries in the round, which bounds ranks.
    fn validate_value(self, value: f64, eligible_entries: usize) -> AppResult<()>;

    /// Whether a juror may submit any subset of their tasks.
    fn allows_partial_ballots(self) -> bool;

    /// Whether a juror may skip a task.
    fn allows_skip(self) -> bool;

    /// Whether results are cut by a threshold rather than ordered.
    fn uses_threshold(self) -> bool;

    /// Summarize the values recorded for one entry. Lower is better for
    /// ranking, higher for the others.
    fn aggregate(self, values: &[f64]) -> Option<f64>;
}

impl VoteRules for VoteMethod {
    fn validate_value(self, value: f64, eligible_entries: usize) -> AppResult<()> {
        match self {
            Self::Rating if RATING_VALUES.contains(&value) => Ok(()),
            Self::Rating => Err(AppError::InvalidAction(format!(
                "rating must be one of 0, 0.25, 0.5, 0.75, 1 (got {value})"
            ))),
            Self::YesNo if YESNO_VALUES.contains(&value) => Ok(()),
            Self::YesNo => Err(AppError::InvalidAction(format!(
                "yes/no vote must be 0 or 1 (got {value})"
            ))),
            Self::Ranking => {
                let max_rank = eligible_entries.saturating_sub(1) as f64;
                if value.is_finite() && value.fract() == 0.0 && (0.0..=max_rank).contains(&value)
                {
                    Ok(())
                } else {
                    Err(AppError::InvalidAction(format!(
                        "rank must be an integer between 0 and {max_rank} (got {value})"
                    )))
                }
            }
        }
    }

    fn allows_partial_ballots(self) -> bool {
        !matches!(self, Self::Ranking)
    }

    fn allows_skip(self) -> bool {
        !matches!(self, Self::Ranking)
    }

    fn uses_threshold(self) -> bool {
        !matches!(self, Self::Ranking)
    }

    fn aggregate(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
