use time::macros::format_description;
use time::OffsetDateTime;

/// Current wall-clock time in the local timezone.
///
/// Some platforms refuse to report the local offset once other threads are running; the
/// operator logs are still useful in UTC, so we fall back to that.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// ISO-8601 with second precision, e.g. `2024-05-02T14:03:27`
pub fn iso_seconds(ts: &OffsetDateTime) -> Result<String, time::error::Format> {
    ts.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]"
    ))
}

/// Filesystem friendly stamp, e.g. `2024-05-02_14-03-27`
pub fn file_stamp(ts: &OffsetDateTime) -> Result<String, time::error::Format> {
    ts.format(format_description!(
        "[year]-[month]-[day]_[hour]-[minute]-[second]"
    ))
}

/// Time of day, e.g. `14:03:27`
pub fn clock_stamp(ts: &OffsetDateTime) -> Result<String, time::error::Format> {
    ts.format(format_description!("[hour]:[minute]:[second]"))
}
