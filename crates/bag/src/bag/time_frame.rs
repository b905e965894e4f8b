//! Temporal windows for event bags.

use std::fmt;
use std::str::FromStr;

use sea_query::{ExprTrait, SimpleExpr};
use serde::{Deserialize, Serialize};

use super::sql::{EVENTS, col};
use super::types::BagContext;
use crate::error::{BagError, BagResult};

/// Symbolic time frame an event bag can be limited to.
///
/// Events without a begin date count as upcoming. Events with a begin date
/// but no end date are treated as ending when they begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeFrame {
    Past,
    PastAndCurrent,
    Current,
    CurrentAndUpcoming,
    Upcoming,
    UpcomingWithBeginDate,
    DeadlineNotOver,
    All,
    Today,
}

impl TimeFrame {
    pub const ALL_KEYS: [&'static str; 9] = [
        "past",
        "pastAndCurrent",
        "current",
        "currentAndUpcoming",
        "upcoming",
        "upcomingWithBeginDate",
        "deadlineNotOver",
        "all",
        "today",
    ];

    /// The key this frame is addressed by.
    pub fn key(self) -> &'static str {
        match self {
            TimeFrame::Past => "past",
            TimeFrame::PastAndCurrent => "pastAndCurrent",
            TimeFrame::Current => "current",
            TimeFrame::CurrentAndUpcoming => "currentAndUpcoming",
            TimeFrame::Upcoming => "upcoming",
            TimeFrame::UpcomingWithBeginDate => "upcomingWithBeginDate",
            TimeFrame::DeadlineNotOver => "deadlineNotOver",
            TimeFrame::All => "all",
            TimeFrame::Today => "today",
        }
    }

    /// Restriction for this frame evaluated at `context.now()`.
    ///
    /// `None` for [`TimeFrame::All`], which does not restrict anything.
    pub fn predicate(self, context: &BagContext) -> BagResult<Option<SimpleExpr>> {
        let now = context.now();
        let begin = || col(EVENTS, "begin_date");
        let end = || col(EVENTS, "end_date");

        let predicate = match self {
            TimeFrame::All => return Ok(None),
            TimeFrame::Past => begin().gt(0).and(
                end()
                    .gt(0)
                    .and(end().lte(now))
                    .or(end().eq(0).and(begin().lte(now))),
            ),
            TimeFrame::PastAndCurrent => begin().gt(0).and(begin().lte(now)),
            TimeFrame::Current => begin()
                .gt(0)
                .and(begin().lte(now))
                .and(end().gt(now)),
            TimeFrame::CurrentAndUpcoming => {
                begin().eq(0).or(begin().gt(now)).or(end().gt(now))
            }
            TimeFrame::Upcoming => begin().eq(0).or(begin().gt(now)),
            TimeFrame::UpcomingWithBeginDate => begin().gt(now),
            TimeFrame::DeadlineNotOver => {
                let deadline = || col(EVENTS, "deadline_registration");
                begin()
                    .eq(0)
                    .or(deadline().gt(now))
                    .or(deadline().eq(0).and(begin().gt(now)))
            }
            TimeFrame::Today => {
                let (start, finish) = context.today()?;
                begin()
                    .between(start, finish)
                    .or(end().between(start, finish))
                    .or(begin().lt(start).and(end().gt(finish)))
            }
        };

        Ok(Some(predicate))
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TimeFrame {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "past" => Ok(TimeFrame::Past),
            "pastAndCurrent" => Ok(TimeFrame::PastAndCurrent),
            "current" => Ok(TimeFrame::Current),
            "currentAndUpcoming" => Ok(TimeFrame::CurrentAndUpcoming),
            "upcoming" => Ok(TimeFrame::Upcoming),
            "upcomingWithBeginDate" => Ok(TimeFrame::UpcomingWithBeginDate),
            "deadlineNotOver" => Ok(TimeFrame::DeadlineNotOver),
            "all" => Ok(TimeFrame::All),
            "today" => Ok(TimeFrame::Today),
            other => Err(BagError::invalid(format!(
                "unknown time frame '{other}', expected one of {}",
                Self::ALL_KEYS.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_str() {
        for key in TimeFrame::ALL_KEYS {
            let frame: TimeFrame = key.parse().unwrap();
            assert_eq!(frame.key(), key);
            assert_eq!(frame.to_string(), key);
        }
    }

    #[test]
    fn unknown_key_is_invalid_argument() {
        let err = "yesterday".parse::<TimeFrame>().unwrap_err();
        assert!(matches!(err, BagError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn serde_uses_camel_case_keys() {
        let frame: TimeFrame = serde_json::from_str("\"upcomingWithBeginDate\"").unwrap();
        assert_eq!(frame, TimeFrame::UpcomingWithBeginDate);
        assert_eq!(
            serde_json::to_string(&TimeFrame::DeadlineNotOver).unwrap(),
            "\"deadlineNotOver\""
        );
    }

    #[test]
    fn all_has_no_predicate() {
        let context = BagContext::utc(1_000);
        assert!(TimeFrame::All.predicate(&context).unwrap().is_none());
    }

    #[test]
    fn every_other_frame_restricts() {
        let context = BagContext::utc(1_710_072_000);
        for key in TimeFrame::ALL_KEYS.into_iter().filter(|k| *k != "all") {
            let frame: TimeFrame = key.parse().unwrap();
            assert!(frame.predicate(&context).unwrap().is_some(), "{key}");
        }
    }
}
