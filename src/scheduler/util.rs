use chrono::{DateTime, Utc};

/// Intervalles semi-ouverts : deux créneaux qui se touchent ne se chevauchent pas.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub(super) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Durée lisible : "< 1m", "42m", "2h 5m", "3h".
pub fn format_response_time(minutes: f64) -> String {
    if minutes < 1.0 {
        return "< 1m".to_string();
    }
    if minutes < 60.0 {
        return format!("{}m", minutes.round() as i64);
    }
    let hours = (minutes / 60.0).floor() as i64;
    let rest = (minutes % 60.0).round() as i64;
    if rest > 0 {
        format!("{hours}h {rest}m")
    } else {
        format!("{hours}h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn touching_is_not_overlap() {
        assert!(!overlaps(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 30), at(10, 45)));
    }

    #[test]
    fn zero_length_interval() {
        assert!(!overlaps(at(10, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(!overlaps(at(11, 0), at(11, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn response_time_format() {
        assert_eq!(format_response_time(0.4), "< 1m");
        assert_eq!(format_response_time(42.2), "42m");
        assert_eq!(format_response_time(125.0), "2h 5m");
        assert_eq!(format_response_time(180.0), "3h");
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(3.14159, 1), 3.1);
        assert_eq!(round_to(0.666, 2), 0.67);
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in 0i64..10_000, la in 1i64..500, b in 0i64..10_000, lb in 1i64..500) {
            let base = at(0, 0);
            let m = chrono::Duration::minutes;
            let (sa, ea) = (base + m(a), base + m(a + la));
            let (sb, eb) = (base + m(b), base + m(b + lb));
            prop_assert_eq!(overlaps(sa, ea, sb, eb), overlaps(sb, eb, sa, ea));
        }
    }
}
