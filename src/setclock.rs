//! Stepping the host's system clock once a minute has decoded cleanly.
//! `setclock.c` was not part of the retained reference sources, so the
//! gating condition below is a deliberate reconstruction (`DESIGN.md`):
//! only ever step the clock from a minute with no decode errors at all,
//! past the startup minutes, and never while a hardware anomaly was
//! observed this second.

use crate::calendar::CivilTime;
use crate::frame_decoder::{DecodeResult, FieldStatus, MinuteLength};
use crate::symbol::HardwareStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetClockResult {
    Ok,
    /// Skipped because the decode wasn't trustworthy enough this minute.
    Unsafe,
    /// The underlying `clock_settime` call failed.
    Failed,
}

/// Whether this minute's decode is trustworthy enough to step the host
/// clock from.
pub fn setclock_ok(init_min: u8, result: &DecodeResult, hwstat: HardwareStatus) -> bool {
    if init_min > 0 || hwstat != HardwareStatus::Ok {
        return false;
    }
    result.minute_length == MinuteLength::Ok
        && result.bit0_ok
        && result.bit59_ok
        && result.year_status == FieldStatus::Ok
        && result.month_status == FieldStatus::Ok
        && result.mday_status == FieldStatus::Ok
        && result.wday_status == FieldStatus::Ok
        && result.hour_status == FieldStatus::Ok
        && result.minute_status == FieldStatus::Ok
}

/// Steps the host clock to `time`.
pub trait ClockSetter {
    fn set_clock(&mut self, time: &CivilTime) -> SetClockResult;
}

/// Does nothing; used in replay mode where the decoded time must never
/// touch the host clock.
pub struct NoopClockSetter;

impl ClockSetter for NoopClockSetter {
    fn set_clock(&mut self, _time: &CivilTime) -> SetClockResult {
        SetClockResult::Ok
    }
}

#[cfg(unix)]
pub struct UnixClockSetter;

#[cfg(unix)]
impl ClockSetter for UnixClockSetter {
    fn set_clock(&mut self, time: &CivilTime) -> SetClockResult {
        use nix::sys::time::TimeSpec;
        use nix::time::{clock_settime, ClockId};

        let tm = libc_like_tm(time);
        match tm {
            Some(epoch_secs) => {
                let ts = TimeSpec::new(epoch_secs, 0);
                match clock_settime(ClockId::CLOCK_REALTIME, ts) {
                    Ok(()) => SetClockResult::Ok,
                    Err(_) => SetClockResult::Failed,
                }
            }
            None => SetClockResult::Failed,
        }
    }
}

/// Converts the decoded civil time to a UTC epoch offset, good enough for
/// `clock_settime`'s whole-second resolution. Treats the decoded fields as
/// already being in the zone `clock_settime` should apply (the reference
/// tool makes the same assumption: it never reads `/etc/localtime`).
#[cfg(unix)]
fn libc_like_tm(time: &CivilTime) -> Option<i64> {
    let days_from_epoch = days_since_epoch(time.year, time.month, time.mday)?;
    Some(days_from_epoch * 86_400 + time.hour as i64 * 3600 + time.minute as i64 * 60)
}

#[cfg(unix)]
fn days_since_epoch(year: u32, month: u32, mday: u32) -> Option<i64> {
    use crate::calendar::last_day_of_month;
    if month == 0 || month > 12 || mday == 0 || mday > last_day_of_month(year, month) {
        return None;
    }
    let mut days: i64 = 0;
    if year >= 1970 {
        for y in 1970..year {
            days += if crate::calendar::is_leap_year(y) { 366 } else { 365 };
        }
    } else {
        for y in year..1970 {
            days -= if crate::calendar::is_leap_year(y) { 366 } else { 365 };
        }
    }
    for m in 1..month {
        days += last_day_of_month(year, m) as i64;
    }
    days += mday as i64 - 1;
    Some(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_decoder::{DstStatus, LeapSecondStatus};

    fn clean_result() -> DecodeResult {
        DecodeResult {
            bit0_ok: true,
            bit52_ok: false,
            bit59_ok: true,
            minute_length: MinuteLength::Ok,
            minute_status: FieldStatus::Ok,
            hour_status: FieldStatus::Ok,
            mday_status: FieldStatus::Ok,
            wday_status: FieldStatus::Ok,
            month_status: FieldStatus::Ok,
            year_status: FieldStatus::Ok,
            dst_status: DstStatus::Ok,
            leapsecond_status: LeapSecondStatus::None,
            dst_announce: false,
        }
    }

    #[test]
    fn test_setclock_ok_on_clean_steady_state_minute() {
        assert!(setclock_ok(0, &clean_result(), HardwareStatus::Ok));
    }

    #[test]
    fn test_setclock_rejects_startup_minutes() {
        assert!(!setclock_ok(1, &clean_result(), HardwareStatus::Ok));
        assert!(!setclock_ok(2, &clean_result(), HardwareStatus::Ok));
    }

    #[test]
    fn test_setclock_rejects_any_field_error() {
        let mut result = clean_result();
        result.hour_status = FieldStatus::Jump;
        assert!(!setclock_ok(0, &result, HardwareStatus::Ok));
    }

    #[cfg(unix)]
    #[test]
    fn test_days_since_epoch_known_date() {
        // 2020-01-01 is 18262 days after 1970-01-01 (a commonly cited
        // reference point); 2019-05-12 is 131 days before 2019-01-01's own
        // epoch day of 17897 (18262 - 365 for non-leap 2019).
        assert_eq!(days_since_epoch(2020, 1, 1), Some(18262));
        assert_eq!(days_since_epoch(2019, 5, 12), Some(18028));
    }
}
