//! Turns one framed minute buffer into a civil time update. Ported from the
//! reference `decode_time.c`: BCD/parity field extraction, minute-length
//! sanity, century inference, leap-second and DST-announcement handling,
//! and the final gated adoption into the running clock.

use crate::calendar::{self, CivilTime, Dst};
use crate::framer::MinuteBuffer;
use crate::symbol::a_bit;

/// Minute-length sanity, from the accumulated bit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinuteLength {
    Ok,
    Short,
    Long,
}

/// Per-field decode outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Ok,
    Bcd,
    Parity,
    /// Decoded cleanly but disagrees with the previous minute's value by
    /// more than the expected one-unit advance.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstStatus {
    Ok,
    /// An unannounced or off-the-hour DST bit change: ignored.
    Jump,
    /// An announced DST change just took effect.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeapSecondStatus {
    None,
    /// A leap second was present and consumed (`minlen == 61`, confirmed).
    One,
    /// The leap second was processed this minute (observed at `minute == 0`).
    Done,
}

/// Full set of per-minute checks, mirroring the reference `DT_result`.
#[derive(Debug, Clone, Copy)]
pub struct DecodeResult {
    pub bit0_ok: bool,
    /// Never actually computed by the reference decoder either (its
    /// `handle_special_bits` is an empty stub); kept here only so the shape
    /// matches the upstream result struct. Always `false`.
    pub bit52_ok: bool,
    pub bit59_ok: bool,
    pub minute_length: MinuteLength,
    pub minute_status: FieldStatus,
    pub hour_status: FieldStatus,
    pub mday_status: FieldStatus,
    pub wday_status: FieldStatus,
    pub month_status: FieldStatus,
    pub year_status: FieldStatus,
    pub dst_status: DstStatus,
    pub leapsecond_status: LeapSecondStatus,
    pub dst_announce: bool,
}

fn slot(buffer: &MinuteBuffer, i: usize) -> u8 {
    buffer[i].unwrap_or(0)
}

/// Single-bit flag field (the DST-announce, DST-active and leap-second
/// marker bits are not parity-protected, unlike the BCD fields).
fn bit_flag(buffer: &MinuteBuffer, i: usize) -> bool {
    buffer[i] == Some(1)
}

fn dst_from_bit(flag: bool) -> Dst {
    if flag {
        Dst::Summer
    } else {
        Dst::Winter
    }
}

/// Odd parity over the A-bits of `start..=stop` plus the B-bit of `parity`.
fn getpar(buffer: &MinuteBuffer, start: usize, stop: usize, parity: usize) -> bool {
    let mut par: u32 = 0;
    for i in start..=stop {
        par += a_bit(slot(buffer, i)) as u32;
    }
    par += crate::symbol::b_bit(slot(buffer, parity)) as u32;
    par & 1 == 1
}

/// MSB-first BCD nibble read over `start..=stop`. Returns 100 if any nibble
/// exceeds 9 (an impossible BCD digit), matching the reference sentinel.
fn getbcd(buffer: &MinuteBuffer, start: usize, stop: usize) -> u32 {
    let mut mul: u32 = 1;
    let mut val: u32 = 0;
    for i in (start..=stop).rev() {
        val += mul * a_bit(slot(buffer, i)) as u32;
        mul *= 2;
        if mul == 16 {
            if val > 9 {
                return 100;
            }
            mul = 10;
        }
    }
    val
}

/// Converts a broadcast weekday code (0 = Sunday .. 6 = Saturday) to the
/// internal convention used by [`calendar`] (Sunday = 7).
fn wday_from_broadcast(code: u32) -> u32 {
    if code == 0 {
        7
    } else {
        code
    }
}

/// Persistent per-receiver decode state: everything the reference decoder
/// keeps in file-scope statics, carried here as struct fields instead.
pub struct FrameDecoder {
    dst_count: u32,
    minute_count: u32,
    olderr: bool,
    acc_minlen_partial: u32,
    dst_announce: bool,
    dst_status: DstStatus,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            dst_count: 0,
            minute_count: 0,
            olderr: false,
            acc_minlen_partial: 0,
            dst_announce: false,
            dst_status: DstStatus::Ok,
        }
    }

    fn check_time_sanity(&self, minlen: i32, buffer: &MinuteBuffer) -> (MinuteLength, bool, bool) {
        let minute_length = if minlen == -1 || minlen > 61 {
            MinuteLength::Long
        } else if minlen < 59 {
            MinuteLength::Short
        } else {
            MinuteLength::Ok
        };
        let bit0_ok = buffer[0] == Some(4);
        let bit59_ok = buffer[59] == Some(0);
        (minute_length, bit0_ok, bit59_ok)
    }

    /// Folds any partial-minute carry into a whole-minute count and, on the
    /// very first (partial) minute only, advances `time` by that many
    /// minutes so the clock is never left at its all-zero default.
    fn increase_old_time(&mut self, init_min: u8, acc_minlen: u32, time: &mut CivilTime) -> i32 {
        let mut acc_minlen = acc_minlen;
        if acc_minlen <= 59_000 {
            self.acc_minlen_partial += acc_minlen;
            if self.acc_minlen_partial >= 60_000 {
                acc_minlen = self.acc_minlen_partial;
                self.acc_minlen_partial %= 60_000;
            }
        }
        let mut increase = (acc_minlen / 60_000) as i32;
        if acc_minlen >= 60_000 {
            self.acc_minlen_partial %= 60_000;
        }
        if acc_minlen % 60_000 > 59_000 {
            increase += 1;
            self.acc_minlen_partial %= 60_000;
        }

        if init_min < 2 {
            let mut t = *time;
            if increase > 0 {
                for _ in 0..increase {
                    t = calendar::add_minute(t, self.dst_announce);
                }
            } else if increase < 0 {
                for _ in 0..(-increase) {
                    t = calendar::subtract_minute(t, self.dst_announce);
                }
            }
            *time = t;
        }
        increase
    }

    /// Extracts and validates every BCD field, applying each one to
    /// `newtime` only if its parity/range checks pass, `errflags` is still
    /// clean, and this is either the startup minute or a minute where the
    /// clock was already advanced by `increase_old_time`. Returns the
    /// updated `errflags` bitfield: bit 0 = year, 1 = month/mday, 2 = wday,
    /// 3 = hour/minute (matching the reference bit layout).
    fn calculate_date_time(
        &self,
        init_min: u8,
        mut errflags: u32,
        increase: i32,
        buffer: &MinuteBuffer,
        time: &CivilTime,
        newtime: &mut CivilTime,
        result: &mut DecodeResult,
    ) -> u32 {
        let apply = init_min == 2 || increase != 0;

        let mut p1 = getpar(buffer, 17, 24, 54);
        let year2 = getbcd(buffer, 17, 24);
        if !p1 {
            result.year_status = FieldStatus::Parity;
        } else if year2 > 99 {
            result.year_status = FieldStatus::Bcd;
            p1 = false;
        } else {
            result.year_status = FieldStatus::Ok;
        }
        if apply && p1 && errflags == 0 {
            newtime.year = year2;
        }

        let mut p2 = getpar(buffer, 25, 35, 55);
        let month = getbcd(buffer, 25, 29);
        let mday = getbcd(buffer, 30, 35);
        if !p2 {
            result.month_status = FieldStatus::Parity;
            result.mday_status = FieldStatus::Parity;
        } else {
            if month == 0 || month > 12 {
                result.month_status = FieldStatus::Bcd;
                p2 = false;
            } else {
                result.month_status = FieldStatus::Ok;
            }
            if mday == 0 || mday > 31 {
                result.mday_status = FieldStatus::Bcd;
                p2 = false;
            } else {
                result.mday_status = FieldStatus::Ok;
            }
        }
        if apply && p2 && errflags == 0 {
            newtime.month = month;
            if init_min == 0 && time.month != newtime.month {
                result.month_status = FieldStatus::Jump;
            }
            newtime.mday = mday;
            if init_min == 0 && time.mday != newtime.mday {
                result.mday_status = FieldStatus::Jump;
            }
        }

        let mut p3 = getpar(buffer, 36, 38, 56);
        let wday_raw = getbcd(buffer, 36, 38);
        if !p3 {
            result.wday_status = FieldStatus::Parity;
        } else if wday_raw == 7 {
            result.wday_status = FieldStatus::Bcd;
            p3 = false;
        } else {
            result.wday_status = FieldStatus::Ok;
        }
        let wday = wday_from_broadcast(wday_raw);
        if apply && p3 && errflags == 0 {
            newtime.wday = wday;
            if init_min == 0 && time.wday != newtime.wday {
                result.wday_status = FieldStatus::Jump;
            }
        }

        // Runs every minute, not just while the year is still a raw
        // two-digit value: the reference decoder re-derives the century
        // from whatever `newtime` currently holds (freshly adopted this
        // round, or carried over from the prior minute) every single call.
        let y2 = newtime.year % 100;
        match calendar::century_offset(y2, newtime.month, newtime.mday, wday) {
            None => {
                result.year_status = FieldStatus::Bcd;
                p1 = false;
            }
            Some(century) => {
                let full_year = century * 100 + y2;
                if init_min == 0 && time.year != full_year {
                    result.year_status = FieldStatus::Jump;
                }
                newtime.year = full_year;
                if newtime.mday > calendar::last_day_of_month(newtime.year, newtime.month) {
                    result.mday_status = FieldStatus::Bcd;
                    p1 = false;
                    p2 = false;
                    p3 = false;
                }
            }
        }

        let mut p4 = getpar(buffer, 39, 51, 57);
        let hour = getbcd(buffer, 39, 44);
        let minute = getbcd(buffer, 45, 51);
        if !p4 {
            result.hour_status = FieldStatus::Parity;
            result.minute_status = FieldStatus::Parity;
        } else {
            if hour > 23 {
                result.hour_status = FieldStatus::Bcd;
                p4 = false;
            } else {
                result.hour_status = FieldStatus::Ok;
            }
            if minute > 59 {
                result.minute_status = FieldStatus::Bcd;
                p4 = false;
            } else {
                result.minute_status = FieldStatus::Ok;
            }
        }
        if apply && p4 && errflags == 0 {
            newtime.hour = hour;
            if init_min == 0 && time.hour != newtime.hour {
                result.hour_status = FieldStatus::Jump;
            }
            newtime.minute = minute;
            if init_min == 0 && time.minute != newtime.minute {
                result.minute_status = FieldStatus::Jump;
            }
        }

        errflags = (errflags << 4)
            | ((!p4 as u32) << 3)
            | ((!p3 as u32) << 2)
            | ((!p2 as u32) << 1)
            | (!p1 as u32);
        errflags
    }

    fn stamp_date_time(&self, errflags: u32, result: &DecodeResult, newtime: CivilTime, time: &mut CivilTime) {
        if result.minute_length == MinuteLength::Ok && (errflags & 0x1f) == 0 {
            time.minute = newtime.minute;
            time.hour = newtime.hour;
            time.mday = newtime.mday;
            time.month = newtime.month;
            time.year = newtime.year;
            time.wday = newtime.wday;
            if result.dst_status != DstStatus::Jump {
                time.isdst = newtime.isdst;
            }
        }
    }

    fn handle_leap_second(
        &self,
        mut errflags: u32,
        minlen: i32,
        buffer: &MinuteBuffer,
        time: &CivilTime,
        result: &mut DecodeResult,
    ) -> u32 {
        if time.minute == 0 {
            result.leapsecond_status = LeapSecondStatus::Done;
            if minlen == 60 {
                result.minute_length = MinuteLength::Short;
                errflags |= 1 << 5;
            } else if minlen == 61 && bit_flag(buffer, 17) {
                result.leapsecond_status = LeapSecondStatus::One;
            }
        } else {
            result.leapsecond_status = LeapSecondStatus::None;
        }
        if minlen == 61 && result.leapsecond_status == LeapSecondStatus::None {
            result.minute_length = MinuteLength::Long;
            errflags |= 1 << 5;
        }
        errflags
    }

    fn handle_dst(
        &mut self,
        mut errflags: u32,
        buffer: &MinuteBuffer,
        time: &CivilTime,
        newtime: &mut CivilTime,
        result: &mut DecodeResult,
    ) -> u32 {
        if bit_flag(buffer, 16) && errflags == 0 {
            self.dst_count += 1;
        }
        if time.minute > 0 {
            self.dst_announce = 2 * self.dst_count > self.minute_count;
        }

        let announced = dst_from_bit(bit_flag(buffer, 17));
        let confirm = dst_from_bit(bit_flag(buffer, 18));
        if announced != time.isdst || confirm == time.isdst {
            if (self.dst_announce && time.minute == 0)
                || (self.olderr && errflags == 0)
                || time.isdst == Dst::Unknown
            {
                newtime.isdst = announced;
            } else {
                self.dst_status = DstStatus::Jump;
                errflags |= 1 << 6;
            }
        }

        if self.dst_announce && time.minute == 0 {
            self.dst_status = DstStatus::Done;
        }
        if time.minute == 0 {
            self.dst_announce = false;
            self.dst_count = 0;
        }
        result.dst_status = self.dst_status;
        result.dst_announce = self.dst_announce;
        errflags
    }

    /// Decodes one framed minute and, if every check passes, folds it into
    /// `time`.
    ///
    /// `init_min` mirrors the reference lifecycle counter: 2 = just
    /// starting (no previous time at all), 1 = first begin-of-minute marker
    /// seen, 0 = steady state.
    pub fn decode(
        &mut self,
        init_min: u8,
        minlen: i32,
        acc_minlen: u32,
        buffer: &MinuteBuffer,
        time: &mut CivilTime,
    ) -> DecodeResult {
        if init_min == 2 {
            time.isdst = Dst::Unknown;
        }
        let mut newtime = *time;

        let (minute_length, bit0_ok, bit59_ok) = self.check_time_sanity(minlen, buffer);
        // The reference decoder resets its DST status to "ok" on every call
        // (inside `check_time_sanity`) before `handle_dst` has a chance to
        // set it to `jump`/`done` again; otherwise a one-off jump would
        // latch forever instead of clearing on the next clean minute.
        self.dst_status = DstStatus::Ok;
        let mut result = DecodeResult {
            bit0_ok,
            bit52_ok: false,
            bit59_ok,
            minute_length,
            minute_status: FieldStatus::Ok,
            hour_status: FieldStatus::Ok,
            mday_status: FieldStatus::Ok,
            wday_status: FieldStatus::Ok,
            month_status: FieldStatus::Ok,
            year_status: FieldStatus::Ok,
            dst_status: self.dst_status,
            leapsecond_status: LeapSecondStatus::None,
            dst_announce: self.dst_announce,
        };

        let mut errflags: u32 = if minute_length == MinuteLength::Ok && bit0_ok && bit59_ok {
            0
        } else {
            1
        };
        if errflags == 0 {
            self.minute_count += 1;
            if self.minute_count == 60 {
                self.minute_count = 0;
            }
        }

        let increase = self.increase_old_time(init_min, acc_minlen, time);

        errflags = self.calculate_date_time(init_min, errflags, increase, buffer, time, &mut newtime, &mut result);

        if init_min < 2 {
            errflags = self.handle_leap_second(errflags, minlen, buffer, time, &mut result);
            errflags = self.handle_dst(errflags, buffer, time, &mut newtime, &mut result);
        }

        self.stamp_date_time(errflags, &result, newtime, time);

        if self.olderr && errflags == 0 {
            self.olderr = false;
        }
        if errflags != 0 {
            self.olderr = true;
        }

        result
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minute buffer from BCD fields, with correct parity bits, a
    /// clean bit0/bit59, and no leap second/DST announcement.
    fn make_buffer(year2: u32, month: u32, mday: u32, wday: u32, hour: u32, minute: u32) -> MinuteBuffer {
        let mut b: MinuteBuffer = [Some(0); 61];
        b[0] = Some(4);

        set_bcd(&mut b, 17, 24, year2);
        set_bcd(&mut b, 25, 29, month);
        set_bcd(&mut b, 30, 35, mday);
        set_bcd(&mut b, 36, 38, wday);
        set_bcd(&mut b, 39, 44, hour);
        set_bcd(&mut b, 45, 51, minute);

        set_parity(&mut b, 17, 24, 54);
        set_parity(&mut b, 25, 35, 55);
        set_parity(&mut b, 36, 38, 56);
        set_parity(&mut b, 39, 51, 57);

        b[59] = Some(0);
        b
    }

    /// Inverse of [`getbcd`]: writes `value`'s decimal digits MSB-first
    /// using the same units/tens nibble-weight progression.
    fn set_bcd(b: &mut MinuteBuffer, start: usize, stop: usize, value: u32) {
        let mut mul: u32 = 1;
        let mut i = stop;
        let mut digit_is_tens = false;
        loop {
            let digit = if digit_is_tens { (value / 10) % 10 } else { value % 10 };
            let shift = match mul {
                1 | 10 => 0,
                2 | 20 => 1,
                4 | 40 => 2,
                8 | 80 => 3,
                _ => 0,
            };
            b[i] = Some(((digit >> shift) & 1) as u8);
            mul *= 2;
            if mul == 16 {
                mul = 10;
                digit_is_tens = true;
            }
            if i == start {
                break;
            }
            i -= 1;
        }
    }

    fn set_parity(b: &mut MinuteBuffer, start: usize, stop: usize, parity: usize) {
        let mut par: u32 = 0;
        for i in start..=stop {
            par += (slot(b, i) & 1) as u32;
        }
        b[parity] = Some(if par % 2 == 1 { 0 } else { 2 });
    }

    #[test]
    fn test_getbcd_reads_decimal_digits() {
        let mut b: MinuteBuffer = [Some(0); 61];
        // encode 23 into bits 39..44 (hour field): tens=2 (2 bits: 10),
        // units=3 (4 bits: 0011) MSB-first across the 6-bit span.
        // tens nibble occupies bits 39-40, units nibble bits 41-44.
        b[39] = Some(1); // tens bit1 = 1
        b[40] = Some(0); // tens bit0 = 0 -> tens = 2
        b[41] = Some(0);
        b[42] = Some(0);
        b[43] = Some(1);
        b[44] = Some(1); // units = 0011 = 3
        assert_eq!(getbcd(&b, 39, 44), 23);
    }

    #[test]
    fn test_getbcd_rejects_invalid_nibble() {
        let mut b: MinuteBuffer = [Some(0); 61];
        b[41] = Some(1);
        b[42] = Some(1);
        b[43] = Some(1);
        b[44] = Some(1); // units nibble = 1111 = 15, invalid
        assert_eq!(getbcd(&b, 39, 44), 100);
    }

    #[test]
    fn test_getpar_detects_flipped_bit() {
        let mut b: MinuteBuffer = [Some(0); 61];
        b[17] = Some(1);
        b[54] = Some(0); // B-bit 0 -> parity contributes 0, total odd -> true
        assert!(getpar(&b, 17, 24, 54));
        b[54] = Some(2); // B-bit 1 -> parity contributes 1, total even -> false
        assert!(!getpar(&b, 17, 24, 54));
    }

    #[test]
    fn test_wday_from_broadcast_sunday_is_seven() {
        assert_eq!(wday_from_broadcast(0), 7);
        assert_eq!(wday_from_broadcast(1), 1);
        assert_eq!(wday_from_broadcast(6), 6);
    }

    #[test]
    fn test_check_time_sanity_flags_short_minute() {
        let d = FrameDecoder::new();
        let b: MinuteBuffer = [Some(0); 61];
        let (len, _, _) = d.check_time_sanity(58, &b);
        assert_eq!(len, MinuteLength::Short);
    }

    #[test]
    fn test_check_time_sanity_flags_long_minute() {
        let d = FrameDecoder::new();
        let b: MinuteBuffer = [Some(0); 61];
        let (len, _, _) = d.check_time_sanity(62, &b);
        assert_eq!(len, MinuteLength::Long);
    }

    #[test]
    fn test_decode_rejects_wrong_minute_length_even_with_good_fields() {
        let mut d = FrameDecoder::new();
        let buf = make_buffer(22, 10, 23, 0, 10, 0);
        let mut time = CivilTime::new();
        let result = d.decode(2, 58, 58_000, &buf, &mut time);
        assert_eq!(result.minute_length, MinuteLength::Short);
        // a short minute never stamps the clock, regardless of field parity
        assert_eq!(time, CivilTime::new());
    }

    #[test]
    fn test_wday_bcd_seven_is_invalid() {
        let mut b: MinuteBuffer = [Some(0); 61];
        set_bcd(&mut b, 36, 38, 7);
        set_parity(&mut b, 36, 38, 56);
        assert_eq!(getbcd(&b, 36, 38), 7);
    }
}
