//! Paper status state machine and the version upload cooldown
//!
//! Pure functions: callers load the paper, ask here whether the move is legal,
//! then perform a conditional write that re-checks the stored status.

use crate::db::models::ArticleStatus;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status changes a paper can be asked to make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Submit,
    Publish,
    Unpublish,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Publish => "publish",
            Transition::Unpublish => "unpublish",
        }
    }

    /// Resulting status when applied to `from`, or an `InvalidTransition` error.
    ///
    /// `in_review -> draft` is accepted on purpose alongside `published -> draft`.
    pub fn apply(self, from: ArticleStatus) -> Result<ArticleStatus> {
        use ArticleStatus::*;

        let to = match (self, from) {
            (Transition::Submit, Draft) => InReview,
            (Transition::Publish, InReview) => Published,
            (Transition::Unpublish, Published | InReview) => Draft,
            _ => {
                return Err(AppError::InvalidTransition {
                    from: from.to_string(),
                    action: self.as_str().to_string(),
                })
            }
        };

        Ok(to)
    }
}

/// Seconds still to wait before another version may be uploaded, if any.
///
/// The window is measured from the newest version of the paper regardless of
/// who uploaded it.
pub fn cooldown_remaining(
    last_upload: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<u64> {
    let last = last_upload?;
    let window = chrono::Duration::from_std(cooldown).ok()?;
    let ready_at = last + window;

    if now < ready_at {
        let wait = (ready_at - now).num_milliseconds().max(0) as u64;
        Some(wait.div_ceil(1000).max(1))
    } else {
        None
    }
}

/// Fail with `Throttled` while the cooldown window is open
pub fn check_cooldown(
    last_upload: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Result<()> {
    match cooldown_remaining(last_upload, now, cooldown) {
        Some(retry_after_secs) => Err(AppError::Throttled { retry_after_secs }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ArticleStatus::*;

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(Transition::Submit.apply(Draft).unwrap(), InReview);
        assert_eq!(Transition::Publish.apply(InReview).unwrap(), Published);
        assert_eq!(Transition::Unpublish.apply(Published).unwrap(), Draft);
        assert_eq!(Transition::Unpublish.apply(InReview).unwrap(), Draft);
    }

    #[test]
    fn test_rejected_transitions() {
        let rejected = [
            (Transition::Submit, InReview),
            (Transition::Submit, Published),
            (Transition::Publish, Draft),
            (Transition::Publish, Published),
            (Transition::Unpublish, Draft),
        ];

        for (transition, from) in rejected {
            let err = transition.apply(from).unwrap_err();
            assert!(
                matches!(err, AppError::InvalidTransition { .. }),
                "{:?} from {:?} should be rejected",
                transition,
                from
            );
        }
    }

    #[test]
    fn test_transition_error_message() {
        let err = Transition::Publish.apply(Published).unwrap_err();
        assert_eq!(err.to_string(), "Cannot publish a paper that is published");
    }

    #[test]
    fn test_cooldown_window() {
        let now = Utc::now();
        let cooldown = Duration::from_secs(5);

        assert_eq!(cooldown_remaining(None, now, cooldown), None);
        assert_eq!(
            cooldown_remaining(Some(now - chrono::Duration::seconds(2)), now, cooldown),
            Some(3)
        );
        assert_eq!(
            cooldown_remaining(Some(now - chrono::Duration::seconds(5)), now, cooldown),
            None
        );
        assert_eq!(
            cooldown_remaining(Some(now - chrono::Duration::milliseconds(4_500)), now, cooldown),
            Some(1)
        );
    }

    #[test]
    fn test_check_cooldown() {
        let now = Utc::now();
        let err = check_cooldown(Some(now), now, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, AppError::Throttled { retry_after_secs: 5 }));

        assert!(check_cooldown(Some(now), now, Duration::ZERO).is_ok());
    }
}
