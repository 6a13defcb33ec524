//! Travel dates as whole days counted from a configured epoch.

use chrono::{NaiveDate, Utc};
use trackline_core::DayOffset;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Date {date} is before the calendar epoch {epoch}")]
    BeforeEpoch { date: NaiveDate, epoch: NaiveDate },
    #[error("Date {0} is too far from the calendar epoch")]
    OutOfRange(NaiveDate),
}

pub fn day_offset(date: NaiveDate, epoch: NaiveDate) -> Result<DayOffset, CalendarError> {
    let days = date.signed_duration_since(epoch).num_days();
    if days < 0 {
        return Err(CalendarError::BeforeEpoch { date, epoch });
    }
    DayOffset::try_from(days).map_err(|_| CalendarError::OutOfRange(date))
}

pub fn date_of(offset: DayOffset, epoch: NaiveDate) -> Option<NaiveDate> {
    epoch.checked_add_days(chrono::Days::new(u64::from(offset)))
}

pub fn today(epoch: NaiveDate) -> Result<DayOffset, CalendarError> {
    day_offset(Utc::now().date_naive(), epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 12, 31).unwrap()
    }

    #[test]
    fn test_offsets_count_days_from_epoch() {
        assert_eq!(day_offset(epoch(), epoch()), Ok(0));
        let new_year = NaiveDate::from_ymd_opt(2012, 1, 1).unwrap();
        assert_eq!(day_offset(new_year, epoch()), Ok(1));

        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let offset = day_offset(date, epoch()).unwrap();
        assert_eq!(date_of(offset, epoch()), Some(date));
    }

    #[test]
    fn test_dates_before_epoch_are_rejected() {
        let date = NaiveDate::from_ymd_opt(2011, 12, 30).unwrap();
        assert!(matches!(
            day_offset(date, epoch()),
            Err(CalendarError::BeforeEpoch { .. })
        ));
    }
}
