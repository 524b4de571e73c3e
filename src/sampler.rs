//! Timed sampling of the GPIO line and classification into one symbol per
//! second. Ported from the reference `collect_pulses`/`get_bit_live`
//! (`input.c`): an exponential low-pass filter feeds a Schmitt trigger,
//! continuously re-tuned against the sender's actual sample rate and bit
//! widths.

use crate::symbol::{HardwareStatus, RawSample, Symbol};
use crate::{MicroHz, ScaledNanos};
use std::time::{Duration, Instant};

/// Environment collaborator: "read one raw pin sample". Implementations
/// apply the configured polarity themselves so [`RawSample::High`] always
/// means "carrier dip / active".
pub trait GpioPin {
    fn read(&mut self) -> RawSample;
}

/// Outcome of driving [`PulseSampler::collect_pulses`] for (part of) a
/// second.
#[derive(Debug, Clone, Copy)]
pub struct CollectOutcome {
    /// Sample index reached when the loop terminated.
    pub t: u32,
    /// Sample index at which the active (dip) portion ended, or `-1` if it
    /// never started (pure passive second so far).
    pub tlow: i64,
    /// Hardware status if the 1.5 s carrier-loss timeout fired.
    pub hwstat: Option<HardwareStatus>,
    /// Set if the GPIO read itself failed.
    pub bad_io: bool,
}

/// Which reset marker (if any) to emit to the capture log this second,
/// matching the single-character markers in `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMarker {
    None,
    /// `real_freq` was below 0.5x nominal.
    FreqLow,
    /// `real_freq` was above 1.0x nominal.
    FreqHigh,
    /// `bit0`/`bit59` sanity failed.
    BitLen,
}

impl ResetMarker {
    pub fn as_char(self) -> Option<char> {
        match self {
            ResetMarker::None => None,
            ResetMarker::FreqLow => Some('<'),
            ResetMarker::FreqHigh => Some('>'),
            ResetMarker::BitLen => Some('!'),
        }
    }
}

/// Bit-timing state, persistent across seconds: the sender's apparent
/// sample rate and the expected low-portion durations of the begin-of-minute
/// and '00' pulses, all scaled by 1e6 to keep comparisons in integer
/// arithmetic (`spec.md` §3, §9 "Integer scaling").
pub struct PulseSampler {
    freq: u32,
    /// Sender's apparent sample rate (`real_freq`).
    pub real_freq: MicroHz,
    /// Expected low-portion duration of the begin-of-minute pulse
    /// (`bit0_width`).
    pub bit0: ScaledNanos,
    /// Expected low-portion duration of a '00' pulse (`bit59_width`).
    pub bit59: ScaledNanos,
}

impl PulseSampler {
    pub fn new(freq: u32) -> Self {
        let real_freq = MicroHz::from_freq(freq);
        PulseSampler {
            freq,
            real_freq,
            bit0: ScaledNanos(real_freq.0 / 2),
            bit59: ScaledNanos(real_freq.0 / 10),
        }
    }

    /// Resets `real_freq` to nominal, returning which marker to log.
    fn reset_frequency(&mut self) -> ResetMarker {
        let marker = if self.real_freq.0 <= self.freq as i64 * 500_000 {
            ResetMarker::FreqLow
        } else {
            ResetMarker::FreqHigh
        };
        self.real_freq = MicroHz::from_freq(self.freq);
        marker
    }

    /// Resets `bit0`/`bit59` to their defaults derived from `real_freq`.
    fn reset_bitlen(&mut self) -> ResetMarker {
        self.bit0 = ScaledNanos(self.real_freq.0 / 2);
        self.bit59 = ScaledNanos(self.real_freq.0 / 10);
        ResetMarker::BitLen
    }

    /// Drives the inner sampling loop for up to one second's worth of
    /// samples (`freq` of them), starting at sample index `start_t`. Used
    /// both for a whole second and, for split ('01') bits, to read the
    /// remainder of a second already partially consumed.
    ///
    /// `adj_freq` is cleared whenever a sanity escape hatch fires, per
    /// `spec.md` §4.2.
    pub fn collect_pulses(
        &mut self,
        pin: &mut dyn GpioPin,
        start_t: u32,
        adj_freq: &mut bool,
        markers: &mut Vec<ResetMarker>,
    ) -> CollectOutcome {
        let a = (1_000_000_000f64 * (1.0 - 2f64.powf(-20.0 / self.freq as f64))) as i64;
        let sec2 = 1_000_000_000i64 / (self.freq as i64 * self.freq as i64).max(1);

        let mut y: i64 = 1_000_000_000;
        let mut stv = 1u8; // 1 = in the active (high) part of the second
        let mut tlow: i64 = -1;
        let mut t = start_t;

        loop {
            if t >= self.freq {
                break;
            }
            let iter_start = Instant::now();

            let p = match pin.read() {
                RawSample::Error => {
                    return CollectOutcome {
                        t,
                        tlow,
                        hwstat: None,
                        bad_io: true,
                    };
                }
                RawSample::High => 1i64,
                RawSample::Low => 0i64,
            };

            y += a * (p * 1_000_000_000 - y) / 1_000_000_000;

            if self.real_freq.0 <= self.freq as i64 * 500_000
                || self.real_freq.0 > self.freq as i64 * 1_000_000
            {
                markers.push(self.reset_frequency());
                *adj_freq = false;
            }

            if t as i64 > self.real_freq.0 * 3 / 2 / 1_000_000 {
                let hwstat = if tlow <= self.freq as i64 / 20 {
                    HardwareStatus::ReceiveOnly
                } else if tlow * 100 / t as i64 >= 99 {
                    HardwareStatus::Transmit
                } else {
                    HardwareStatus::Random
                };
                *adj_freq = false;
                return CollectOutcome {
                    t,
                    tlow,
                    hwstat: Some(hwstat),
                    bad_io: false,
                };
            }

            if y < 500_000_000 && stv == 1 {
                // end of the active (dip) part of the second
                y = 0;
                stv = 0;
                tlow = t as i64;
            }
            if y > 500_000_000 && stv == 0 {
                // end of the passive part: start of a new second. The
                // reference `for (bit.t = start; …; bit.t++)` loop's
                // `break` (input.c:402) fires before the loop's own
                // post-increment, so `bit.t` is returned un-incremented;
                // do not bump `t` here either.
                break;
            }

            let mut twait = sec2 * self.real_freq.0 / 1_000_000;
            twait -= iter_start.elapsed().as_nanos() as i64;
            if twait > 0 {
                std::thread::sleep(Duration::from_nanos(twait as u64));
            }
            t += 1;
        }

        if t >= self.freq {
            markers.push(self.reset_frequency());
            *adj_freq = false;
        }

        CollectOutcome {
            t,
            tlow,
            hwstat: None,
            bad_io: false,
        }
    }

    /// `len100ms` as used by the ratio classification in `spec.md` §4.3:
    /// the expected duration of a ~100 ms low period, scaled consistently
    /// with `real_freq * t`.
    pub fn len100ms(&self) -> ScaledNanos {
        ScaledNanos(self.bit0.0 / 10 + self.bit59.0 / 2)
    }

    /// Adapts `bit59` towards the observed low duration of a '00' pulse at
    /// second 59, or `bit0` towards the observed low duration of a
    /// begin-of-minute pulse, then checks the sanity gates from `spec.md`
    /// §3/§4.3. Returns a reset marker if a gate failed.
    pub fn adapt_bit_width(&mut self, bitpos: u8, symbol: Symbol, tlow: i64) -> Option<ResetMarker> {
        if bitpos == 59 && symbol == Symbol::Zero {
            self.bit59 = ScaledNanos(self.bit59.0 + (tlow * 1_000_000 - self.bit59.0) / 2);
        }
        if symbol == Symbol::BeginOfMinute {
            self.bit0 = ScaledNanos(self.bit0.0 + (tlow * 1_000_000 - self.bit0.0) / 2);
        }
        let avg = (self.bit0.0 - self.bit59.0) / 2;
        if 4 * self.bit0.0 < self.bit59.0 * 15 || 2 * self.bit0.0 > self.bit59.0 * 15 {
            return Some(self.reset_bitlen());
        }
        if self.bit0.0 + avg < self.real_freq.0 / 2 || self.bit0.0 - avg > self.real_freq.0 / 2 {
            return Some(self.reset_bitlen());
        }
        if self.bit59.0 + avg < self.real_freq.0 / 10 {
            return Some(self.reset_bitlen());
        }
        None
    }

    /// Nudges `real_freq` towards the observed per-second sample count `t`.
    pub fn adapt_frequency(&mut self, t: u32) {
        self.real_freq = MicroHz(self.real_freq.0 + (t as i64 * 1_000_000 - self.real_freq.0) / 20);
    }

    /// Converts this second's sample count into milliseconds, for
    /// `acc_minlen` accounting.
    pub fn elapsed_ms(&self, t: u32) -> u32 {
        (1_000_000i64 * t as i64 / (self.real_freq.0 / 1_000)) as u32
    }
}

/// Classifies a completed second's `(tlow, t)` measurement into a [`Symbol`],
/// per the ratio table in `spec.md` §4.3. Returns `(symbol, needs_more)`:
/// `needs_more` is set for a split '01' bit, where the caller must re-enter
/// [`PulseSampler::collect_pulses`] for the remainder of the second.
pub fn classify(tlow: i64, t: u32, real_freq: MicroHz, len100ms: ScaledNanos) -> (Symbol, bool) {
    if tlow < 0 || len100ms.0 == 0 {
        return (Symbol::None, false);
    }
    let t = t as i64;
    let real_freq = real_freq.0;
    let len100ms = len100ms.0;
    let two_r_num = 2 * tlow * real_freq;
    let den = len100ms * t;
    let min_t = real_freq * 4 / 10_000_000; // real_freq * 4e-7, i.e. bit.t >= realfreq/2_500_000
    if two_r_num < 3 * den {
        (Symbol::Zero, false)
    } else if two_r_num < 5 * den {
        (Symbol::One, false)
    } else if two_r_num < 7 * den {
        if t >= min_t {
            (Symbol::Two, false)
        } else {
            (Symbol::Split, true)
        }
    } else if tlow * real_freq < 6 * den {
        if t >= min_t {
            (Symbol::BeginOfMinute, false)
        } else {
            (Symbol::Split, true)
        }
    } else {
        (Symbol::None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ: u32 = 1000;
    const REAL_FREQ: MicroHz = MicroHz(FREQ as i64 * 1_000_000);

    fn len100ms() -> ScaledNanos {
        PulseSampler::new(FREQ).len100ms()
    }

    #[test]
    fn test_classify_zero() {
        // ~100 ms active out of 1000 samples at 1000 Hz.
        let (sym, more) = classify(100, FREQ, REAL_FREQ, len100ms());
        assert_eq!(sym, Symbol::Zero);
        assert!(!more);
    }

    #[test]
    fn test_classify_one() {
        let (sym, more) = classify(200, FREQ, REAL_FREQ, len100ms());
        assert_eq!(sym, Symbol::One);
        assert!(!more);
    }

    #[test]
    fn test_classify_two() {
        let (sym, more) = classify(300, FREQ, REAL_FREQ, len100ms());
        assert_eq!(sym, Symbol::Two);
        assert!(!more);
    }

    #[test]
    fn test_classify_begin_of_minute() {
        let (sym, more) = classify(500, FREQ, REAL_FREQ, len100ms());
        assert_eq!(sym, Symbol::BeginOfMinute);
        assert!(!more);
    }

    #[test]
    fn test_classify_none_when_never_active() {
        let (sym, more) = classify(-1, FREQ, REAL_FREQ, len100ms());
        assert_eq!(sym, Symbol::None);
        assert!(!more);
    }

    #[test]
    fn test_adapt_bit_width_sane_values_no_reset() {
        let mut s = PulseSampler::new(FREQ);
        let r = s.adapt_bit_width(59, Symbol::Zero, 100);
        assert!(r.is_none());
    }

    #[test]
    fn test_adapt_bit_width_spurious_long_pulse_resets() {
        // bit0 = 0.2 * real_freq, well outside the sane band around
        // real_freq/2: a spurious short pulse should trigger a reset.
        let mut s = PulseSampler::new(FREQ);
        s.bit0 = ScaledNanos((REAL_FREQ.0 as f64 * 0.2) as i64);
        let r = s.adapt_bit_width(0, Symbol::None, 0);
        assert_eq!(r, Some(ResetMarker::BitLen));
        assert_eq!(s.bit0, ScaledNanos(s.real_freq.0 / 2));
        assert_eq!(s.bit59, ScaledNanos(s.real_freq.0 / 10));
    }

    #[test]
    fn test_reset_marker_chars() {
        assert_eq!(ResetMarker::FreqLow.as_char(), Some('<'));
        assert_eq!(ResetMarker::FreqHigh.as_char(), Some('>'));
        assert_eq!(ResetMarker::BitLen.as_char(), Some('!'));
        assert_eq!(ResetMarker::None.as_char(), None);
    }
}
