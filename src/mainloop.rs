//! Wires the sampler/framer/decoder pipeline together and drives it one
//! second at a time. Ported from `mainloop()`/`check_handle_new_minute()`
//! (`mainloop.c`), generalized over [`BitSource`] so the live daemon and
//! the capture-log replay tool share the same loop.

use crate::calendar::CivilTime;
use crate::capture_log::{CaptureReader, CaptureSink, LogEvent};
use crate::display::DisplaySink;
use crate::frame_decoder::FrameDecoder;
use crate::framer::{Marker, MinuteFramer};
use crate::sampler::{classify, GpioPin, PulseSampler, ResetMarker};
use crate::setclock::{setclock_ok, ClockSetter};
use crate::symbol::{HardwareStatus, Symbol};
use std::io::Read;

/// One second's worth of input, already normalized to the symbol alphabet
/// regardless of whether it came from live sampling or a capture-log
/// replay.
pub struct SecondReading {
    pub symbol: Symbol,
    pub hwstat: HardwareStatus,
    pub elapsed_ms: u32,
    pub bad_io: bool,
    pub done: bool,
    /// Bit-timing reset markers (`'<'`, `'>'`, `'!'`) raised while sampling
    /// this second, in the order they fired. Always empty for a replay
    /// source: those markers are a live-sampling write-side diagnostic, not
    /// part of the decode alphabet a capture log is replayed through.
    pub markers: Vec<ResetMarker>,
    /// A verbatim `acc_minlen` checkpoint from a capture log (the `a<u32>`
    /// alphabet entry), to be applied directly rather than accumulated.
    /// When set, this reading carries no bit of its own and the caller
    /// should skip display/framing for it.
    pub acc_override: Option<u32>,
}

impl SecondReading {
    fn checkpoint(acc_minlen: u32) -> Self {
        SecondReading {
            symbol: Symbol::None,
            hwstat: HardwareStatus::Ok,
            elapsed_ms: 0,
            bad_io: false,
            done: false,
            markers: Vec::new(),
            acc_override: Some(acc_minlen),
        }
    }

    fn done() -> Self {
        SecondReading {
            symbol: Symbol::None,
            hwstat: HardwareStatus::Ok,
            elapsed_ms: 0,
            bad_io: false,
            done: true,
            markers: Vec::new(),
            acc_override: None,
        }
    }
}

/// Produces one [`SecondReading`] at a time: live GPIO sampling or
/// capture-log replay. `bitpos` is the framer's current slot cursor,
/// threaded in so a live source can decide whether this second is the
/// '00' bit at slot 59 (the only slot whose low-width feeds `bit59`
/// adaptation, `spec.md` §4.3).
pub trait BitSource {
    fn next_second(&mut self, bitpos: u8) -> SecondReading;
}

/// Live GPIO sampling, porting `get_bit_live`.
pub struct LiveBitSource<P> {
    pin: P,
    sampler: PulseSampler,
    /// 2 = just starting, 1 = first bit seen, 0 = steady state; mirrors
    /// `init_bit` in `get_bit_live`, which only gates frequency
    /// initialization, not the decoder's own `init_min`.
    init_bit: u8,
}

impl<P: GpioPin> LiveBitSource<P> {
    pub fn new(pin: P, freq: u32) -> Self {
        LiveBitSource {
            pin,
            sampler: PulseSampler::new(freq),
            init_bit: 2,
        }
    }
}

impl<P: GpioPin> BitSource for LiveBitSource<P> {
    fn next_second(&mut self, bitpos: u8) -> SecondReading {
        let mut adj_freq = true;
        let mut markers = Vec::new();
        let len100ms = self.sampler.len100ms();

        let mut outcome = self.sampler.collect_pulses(&mut self.pin, 0, &mut adj_freq, &mut markers);
        if outcome.bad_io {
            return SecondReading {
                symbol: Symbol::None,
                hwstat: HardwareStatus::Ok,
                elapsed_ms: 0,
                bad_io: true,
                done: false,
                markers,
                acc_override: None,
            };
        }
        if let Some(hwstat) = outcome.hwstat {
            let elapsed_ms = self.sampler.elapsed_ms(outcome.t);
            return SecondReading {
                symbol: Symbol::None,
                hwstat,
                elapsed_ms,
                bad_io: false,
                done: false,
                markers,
                acc_override: None,
            };
        }

        let (mut symbol, needs_more) = classify(outcome.tlow, outcome.t, self.sampler.real_freq, len100ms);
        if needs_more {
            outcome = self
                .sampler
                .collect_pulses(&mut self.pin, outcome.t, &mut adj_freq, &mut markers);
            symbol = Symbol::Split;
        }

        if symbol == Symbol::None {
            adj_freq = false;
        } else if self.init_bit == 1 {
            self.init_bit = 0;
        } else if let Some(marker) = self.sampler.adapt_bit_width(bitpos, symbol, outcome.tlow) {
            markers.push(marker);
        }

        if adj_freq {
            self.sampler.adapt_frequency(outcome.t);
        }

        let elapsed_ms = self.sampler.elapsed_ms(outcome.t);
        SecondReading {
            symbol,
            hwstat: HardwareStatus::Ok,
            elapsed_ms,
            bad_io: false,
            done: false,
            markers,
            acc_override: None,
        }
    }
}

/// Capture-log replay, porting `get_bit_file`.
pub struct ReplayBitSource<R> {
    reader: CaptureReader<R>,
}

impl<R: Read> ReplayBitSource<R> {
    pub fn new(reader: CaptureReader<R>) -> Self {
        ReplayBitSource { reader }
    }
}

impl<R: Read> BitSource for ReplayBitSource<R> {
    fn next_second(&mut self, _bitpos: u8) -> SecondReading {
        match self.reader.next_event() {
            Ok(LogEvent::Symbol(symbol, elapsed_ms)) => SecondReading {
                symbol,
                hwstat: HardwareStatus::Ok,
                elapsed_ms,
                bad_io: false,
                done: false,
                markers: Vec::new(),
                acc_override: None,
            },
            Ok(LogEvent::HardwareStatus(hwstat, elapsed_ms)) => SecondReading {
                symbol: Symbol::None,
                hwstat,
                elapsed_ms,
                bad_io: false,
                done: false,
                markers: Vec::new(),
                acc_override: None,
            },
            Ok(LogEvent::BadIo) => SecondReading {
                symbol: Symbol::None,
                hwstat: HardwareStatus::Ok,
                elapsed_ms: 0,
                bad_io: true,
                done: false,
                markers: Vec::new(),
                acc_override: None,
            },
            Ok(LogEvent::AccMinlen(v)) => SecondReading::checkpoint(v),
            Ok(LogEvent::Eof) | Err(_) => SecondReading::done(),
        }
    }
}

/// Drives the sampler/framer/decoder pipeline to completion (or
/// indefinitely, for a live source), reporting through `sink` and
/// optionally stepping the host clock.
pub struct MainLoop {
    framer: MinuteFramer,
    decoder: FrameDecoder,
    time: CivilTime,
    init_min: u8,
    /// `bitpos_before` as captured on the *previous* iteration. This is the
    /// reference mainloop's `old_bitpos`: `minlen` on a `Minute`/`Late`
    /// second is the bit count from the second *before* the marker, not the
    /// marker second's own (already-advanced) `bitpos_before`.
    prev_bitpos_before: u8,
}

impl MainLoop {
    pub fn new() -> Self {
        MainLoop {
            framer: MinuteFramer::new(),
            decoder: FrameDecoder::new(),
            time: CivilTime::new(),
            init_min: 2,
            prev_bitpos_before: 0,
        }
    }

    pub fn run(
        &mut self,
        source: &mut dyn BitSource,
        sink: &mut dyn DisplaySink,
        mut capture: Option<&mut dyn CaptureSink>,
        mut clock_setter: Option<&mut dyn ClockSetter>,
        settime: bool,
    ) {
        loop {
            let bitpos_before = self.framer.bitpos();
            let reading = source.next_second(bitpos_before);
            if reading.done {
                break;
            }
            if let Some(acc) = reading.acc_override {
                self.framer.acc_minlen = acc;
                continue;
            }

            if let Some(cap) = capture.as_deref_mut() {
                for marker in &reading.markers {
                    if let Some(c) = marker.as_char() {
                        cap.write_reset_marker(c);
                    }
                }
                if reading.bad_io {
                    cap.write_bad_io();
                } else if reading.hwstat != HardwareStatus::Ok {
                    cap.write_hardware_status(reading.hwstat);
                } else {
                    cap.write_symbol(reading.symbol);
                }
            }

            sink.display_bit(bitpos_before, reading.hwstat, reading.symbol);

            let marker = self.framer.push_symbol(reading.symbol, reading.elapsed_ms);
            sink.display_new_second();

            // A plain `Minute` invokes the decoder with the bit count from
            // the second *before* it (`old_bitpos`). `TooLong` itself never
            // decodes — it only flags the overflow. `Late` is the begin-of-
            // minute marker arriving on the very next second: the reference
            // mainloop's `was_toolong` gate means *this* is where the
            // deferred decode for that aborted minute actually happens, but
            // with the stale `minlen == -1` left over from the overflow
            // rather than a bit count, so the minute is unconditionally
            // classified long.
            let minlen: Option<i32> = match marker {
                Marker::Minute => Some(self.prev_bitpos_before as i32),
                Marker::Late => Some(-1),
                Marker::TooLong => {
                    sink.display_long_minute();
                    None
                }
                Marker::None => None,
            };
            self.prev_bitpos_before = bitpos_before;

            if matches!(marker, Marker::Minute | Marker::Late) {
                if let Some(cap) = capture.as_deref_mut() {
                    cap.write_acc_minlen(self.framer.acc_minlen);
                }
            }

            if let Some(minlen) = minlen {
                let buffer = self.framer.take_minute();
                sink.display_minute(minlen, self.framer.acc_minlen, self.framer.cutoff.map(|c| c as i64));
                let result = self
                    .decoder
                    .decode(self.init_min, minlen, self.framer.acc_minlen, &buffer, &mut self.time);
                sink.display_time(&result, &self.time);

                if settime && setclock_ok(self.init_min, &result, reading.hwstat) {
                    if let Some(cs) = clock_setter.as_deref_mut() {
                        cs.set_clock(&self.time);
                    }
                }

                self.framer.reset_acc_minlen();
                if self.init_min > 0 {
                    self.init_min -= 1;
                }
            }
        }
    }

    pub fn time(&self) -> &CivilTime {
        &self.time
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}
