//! Decoder for the UK NPL 60 kHz time broadcast (MSF, Anthorn).
//!
//! The broadcast carries 60 one-second slots per minute. Within each second
//! the carrier is dipped for 100/200/300 ms (or a 100+100 ms split) to
//! encode an A/B bit pair, except for second 0 which carries a 500 ms
//! begin-of-minute marker. This crate turns a raw GPIO pulse stream into
//! that bit pattern (`sampler`, `symbol`), frames it into minutes
//! (`framer`), and decodes the framed minute into a civil date/time
//! (`frame_decoder`). `mainloop` wires the pieces together; `config`,
//! `gpio`, `capture_log`, `display` and `setclock` are the host-facing
//! collaborators described at the interface level only.
//!
//! Build with no_std is not supported: unlike embedded MSF/DCF77 receivers,
//! this decoder targets a Linux/FreeBSD single-board host with a sysfs or
//! ioctl GPIO interface, JSON configuration, and a capture-log file, so it
//! depends on `std` throughout.

pub mod calendar;
pub mod capture_log;
pub mod config;
pub mod display;
pub mod error;
pub mod frame_decoder;
pub mod framer;
pub mod gpio;
pub mod mainloop;
pub mod sampler;
pub mod setclock;
pub mod symbol;

/// A frequency scaled by 1e6, i.e. micro-Hertz, used throughout the sampler
/// and symbol decoder to do division-free comparisons in integer
/// arithmetic. `real_freq` is stored as `nominal_freq * 1_000_000` initially
/// and is nudged towards the sender's actual rate every second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MicroHz(pub i64);

impl MicroHz {
    pub fn from_freq(freq: u32) -> Self {
        MicroHz(freq as i64 * 1_000_000)
    }
}

/// A duration scaled by 1e6 relative to a sample count, used for
/// `bit0_width`/`bit59_width`. These track the low-portion duration (in
/// sample counts) of the begin-of-minute and '00' pulses, scaled the same
/// way as [`MicroHz`] so the two can be compared without floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScaledNanos(pub i64);

/// Minimum allowed sample frequency, inclusive (`spec.md` §6).
pub const FREQ_MIN: u32 = 10;
/// Maximum allowed sample frequency, inclusive (`spec.md` §6).
pub const FREQ_MAX: u32 = 120_000;
