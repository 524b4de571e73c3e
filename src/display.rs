//! Output collaborators: how a running decode is reported. Ported from
//! `nplpi-analyze.c`'s `display_*` functions, generalized into a trait so
//! the live daemon and the replay tool can share the main loop while
//! choosing different sinks (`spec.md` §9, capability/sink-object pattern).

use crate::calendar::{weekday_name, CivilTime, Dst};
use crate::frame_decoder::{DecodeResult, FieldStatus, LeapSecondStatus, MinuteLength};
use crate::symbol::{HardwareStatus, Symbol};

/// Bit positions where the reference display inserts a space, marking
/// field boundaries (`is_space_bit`, `input.c`).
pub fn is_space_bit(bitpos: u8) -> bool {
    matches!(bitpos, 1 | 9 | 17 | 25 | 30 | 36 | 39 | 45 | 52)
}

/// Receives per-second and per-minute decode events for display or logging.
/// Default methods are no-ops, so a sink only needs to implement what it
/// cares about (mirroring the reference's nullable function-pointer
/// callbacks in `mainloop()`).
pub trait DisplaySink {
    fn display_bit(&mut self, bitpos: u8, hwstat: HardwareStatus, symbol: Symbol) {
        let _ = (bitpos, hwstat, symbol);
    }
    fn display_time(&mut self, result: &DecodeResult, time: &CivilTime) {
        let _ = (result, time);
    }
    fn display_minute(&mut self, minlen: i32, acc_minlen: u32, cutoff: Option<i64>) {
        let _ = (minlen, acc_minlen, cutoff);
    }
    fn display_long_minute(&mut self) {}
    fn display_new_second(&mut self) {}
}

/// Plain-text sink reproducing the reference CLI output byte-for-byte.
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn display_bit(&mut self, bitpos: u8, hwstat: HardwareStatus, symbol: Symbol) {
        if is_space_bit(bitpos) {
            print!(" ");
        }
        match hwstat {
            HardwareStatus::ReceiveOnly => print!("r"),
            HardwareStatus::Transmit => print!("x"),
            HardwareStatus::Random => print!("#"),
            HardwareStatus::Ok => match symbol.code() {
                Some(code) => print!("{}", code),
                None => print!("_"),
            },
        }
    }

    fn display_time(&mut self, dt: &DecodeResult, time: &CivilTime) {
        let isdst = match time.isdst {
            Dst::Summer => "summer",
            Dst::Winter => "winter",
            Dst::Unknown => "?     ",
        };
        println!(
            "{} {:04}-{:02}-{:02} {} {:02}:{:02}",
            isdst,
            time.year,
            time.month,
            time.mday,
            weekday_name(time.wday),
            time.hour,
            time.minute
        );
        if dt.minute_length == MinuteLength::Long {
            println!("Minute too long");
        } else if dt.minute_length == MinuteLength::Short {
            println!("Minute too short");
        }
        match dt.dst_status {
            crate::frame_decoder::DstStatus::Jump => println!("Time offset jump (ignored)"),
            crate::frame_decoder::DstStatus::Done => println!("Time offset changed"),
            crate::frame_decoder::DstStatus::Ok => {}
        }
        match dt.minute_status {
            FieldStatus::Parity => println!("Minute parity error"),
            FieldStatus::Bcd => println!("Minute value error"),
            FieldStatus::Jump => println!("Minute value jump"),
            FieldStatus::Ok => {}
        }
        match dt.hour_status {
            FieldStatus::Parity => println!("Hour parity error"),
            FieldStatus::Bcd => println!("Hour value error"),
            FieldStatus::Jump => println!("Hour value jump"),
            FieldStatus::Ok => {}
        }
        if dt.mday_status == FieldStatus::Parity {
            println!("Date parity error");
        }
        match dt.wday_status {
            FieldStatus::Bcd => println!("Day-of-week value error"),
            FieldStatus::Jump => println!("Day-of-week value jump"),
            _ => {}
        }
        match dt.mday_status {
            FieldStatus::Bcd => println!("Day-of-month value error"),
            FieldStatus::Jump => println!("Day-of-month value jump"),
            _ => {}
        }
        match dt.month_status {
            FieldStatus::Bcd => println!("Month value error"),
            FieldStatus::Jump => println!("Month value jump"),
            _ => {}
        }
        match dt.year_status {
            FieldStatus::Bcd => println!("Year value error"),
            FieldStatus::Jump => println!("Year value jump"),
            _ => {}
        }
        if !dt.bit0_ok {
            println!("Minute marker error");
        }
        if dt.dst_announce {
            println!("Time offset change announced");
        }
        if dt.leapsecond_status == LeapSecondStatus::Done {
            println!("Leap second processed");
        } else if dt.leapsecond_status == LeapSecondStatus::One {
            println!("Leap second processed with value 1 instead of 0");
        }
        println!();
    }

    fn display_minute(&mut self, minlen: i32, acc_minlen: u32, cutoff: Option<i64>) {
        print!(" ({}) {} ", acc_minlen, minlen);
        match cutoff {
            None => println!("?"),
            Some(c) => println!("{:6.4}", c as f64 / 1e4),
        }
    }

    fn display_long_minute(&mut self) {
        print!(" L ");
    }
}

/// Discards every event; useful when replaying a log purely to update the
/// clock with no terminal output.
pub struct NullSink;

impl DisplaySink for NullSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_space_bit_matches_field_boundaries() {
        for bitpos in [1, 9, 17, 25, 30, 36, 39, 45, 52] {
            assert!(is_space_bit(bitpos));
        }
        assert!(!is_space_bit(2));
        assert!(!is_space_bit(60));
    }
}
