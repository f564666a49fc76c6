/// Calendar day with total ordering; no time-of-day or zone is attached to
/// any directive.
pub type Date = chrono::NaiveDate;
