use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Whole minutes between two instants, floored at zero.
pub(crate) fn minutes_between(from: PrimitiveDateTime, to: PrimitiveDateTime) -> i64 {
    let seconds = to.assume_utc().unix_timestamp() - from.assume_utc().unix_timestamp();
    (seconds / 60).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    fn at(hour: u8, minute: u8, second: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, second).unwrap())
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(at(10, 20, 30)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn minutes_between_floors_to_whole_minutes() {
        assert_eq!(minutes_between(at(10, 0, 0), at(10, 12, 59)), 12);
    }

    #[test]
    fn minutes_between_clamps_negative() {
        assert_eq!(minutes_between(at(11, 0, 0), at(10, 0, 0)), 0);
    }
}
