use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Microsecond-resolution stamp used to prefix stored upload names.
pub fn upload_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%S%6f").to_string()
}
