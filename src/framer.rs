//! Assembles per-second symbols into 61-slot minute buffers and tracks the
//! begin-of-minute marker's arrival relative to the running bit count.
//! Ported from the reference `next_bit`/`check_handle_new_minute`
//! (`input.c`, `mainloop.c`).

use crate::symbol::Symbol;

/// One minute's worth of decoded buffer slots. Slot 0 is always the
/// begin-of-minute marker (code 4) once seen; slots 1..=59 hold the A/B bit
/// codes for seconds 1..59; slot 60 is unused padding kept only so index 59
/// is never an off-by-one trap at the buffer boundary.
pub type MinuteBuffer = [Option<u8>; 61];

/// How the begin-of-minute marker (or its absence) was classified this
/// second, relative to the running `bitpos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// No marker this second; an ordinary bit was appended.
    None,
    /// A begin-of-minute marker arrived and resynchronized the framer.
    Minute,
    /// A begin-of-minute marker arrived on the second immediately following
    /// a `TooLong` overflow: a 61-bit minute (e.g. one carrying a leap
    /// second) rather than a genuinely desynchronized receiver.
    Late,
    /// `bitpos` ran past 60 without a marker: the minute is abandoned and
    /// reframed from here.
    TooLong,
}

/// Assembles one minute buffer at a time and classifies the begin-of-minute
/// marker's timing.
pub struct MinuteFramer {
    bitpos: u8,
    buffer: MinuteBuffer,
    /// Running sum of this minute's elapsed milliseconds so far, independent
    /// of how many bits were actually read (`spec.md` invariant: accumulates
    /// every second, readable or not).
    pub acc_minlen: u32,
    /// Most recently computed expected-minute-length cutoff, carried only
    /// for display/logging symmetry with the reference tool's
    /// `(acc_minlen) minlen cutoff` triple; the framer itself does not act
    /// on it.
    pub cutoff: Option<u32>,
    /// Set for exactly one call after a `TooLong` overflow: if the very next
    /// second's symbol is a begin-of-minute marker, it is classified `Late`
    /// instead of `Minute` (the reference `next_bit`'s `emark_toolong` ->
    /// `emark_late` remap, triggered only while the overflow marker is still
    /// the framer's last-seen state and cleared by any other symbol).
    after_toolong: bool,
}

impl MinuteFramer {
    pub fn new() -> Self {
        MinuteFramer {
            bitpos: 0,
            buffer: [None; 61],
            acc_minlen: 0,
            cutoff: None,
            after_toolong: false,
        }
    }

    pub fn bitpos(&self) -> u8 {
        self.bitpos
    }

    pub fn buffer(&self) -> &MinuteBuffer {
        &self.buffer
    }

    pub fn reset_acc_minlen(&mut self) {
        self.acc_minlen = 0;
    }

    /// Appends one second's decoded symbol at the current `bitpos`,
    /// classifies any begin-of-minute transition, and advances or resets
    /// `bitpos` accordingly. `elapsed_ms` is added to `acc_minlen`
    /// unconditionally, even for an unreadable (`Symbol::None`) second.
    ///
    /// Returns the marker classification; on `Marker::Minute` or
    /// `Marker::TooLong` the caller should take the now-complete buffer via
    /// [`Self::take_minute`] before more bits are pushed.
    pub fn push_symbol(&mut self, symbol: Symbol, elapsed_ms: u32) -> Marker {
        self.acc_minlen += elapsed_ms;

        if symbol == Symbol::BeginOfMinute {
            // A begin-of-minute marker always resynchronizes the buffer,
            // regardless of where `bitpos` currently stands: the reference
            // `get_bit_live` sets `emark_minute` unconditionally whenever the
            // Schmitt trigger sees the ~500ms dip, and `next_bit` forces
            // `bitpos = 1` whenever the marker is `minute` or `late`. A
            // marker arriving well before slot 59 simply truncates the
            // previous (now short) minute; there is no separate "too early"
            // classification.
            let marker = if self.after_toolong {
                Marker::Late
            } else {
                Marker::Minute
            };
            self.after_toolong = false;
            self.buffer[0] = symbol.code();
            self.bitpos = 1;
            return marker;
        }

        // Any non-marker symbol clears the one-call `Late` eligibility
        // window, matching `next_bit`'s "fits again" remap back to `none`.
        self.after_toolong = false;

        // An unreadable second (`Symbol::None`) leaves the slot untouched,
        // so it still carries whatever value was decoded there last
        // minute rather than going blank.
        let slot = self.bitpos as usize;
        if let Some(code) = symbol.code() {
            if slot < self.buffer.len() {
                self.buffer[slot] = Some(code);
            }
        }
        self.bitpos += 1;

        if self.bitpos > 60 {
            self.bitpos = 0;
            self.after_toolong = true;
            return Marker::TooLong;
        }
        Marker::None
    }

    /// Repositions `bitpos` directly, for capture-log replay where the
    /// marker alphabet (`#`/`*`) already encodes the classification and the
    /// framer only needs to resynchronize its slot cursor rather than
    /// re-derive it from a live symbol stream.
    pub fn replay_set_bitpos(&mut self, bitpos: u8) {
        self.bitpos = bitpos;
    }

    /// Snapshots the just-completed minute buffer. The buffer itself is
    /// deliberately *not* cleared: an unreadable second next minute will
    /// fall back to whatever value its slot held this minute, matching the
    /// reference decoder's tolerance for brief dropouts.
    pub fn take_minute(&self) -> MinuteBuffer {
        self.buffer
    }
}

impl Default for MinuteFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_on_time_is_minute() {
        let mut f = MinuteFramer::new();
        for _ in 0..59 {
            assert_eq!(f.push_symbol(Symbol::Zero, 1000), Marker::None);
        }
        assert_eq!(f.push_symbol(Symbol::BeginOfMinute, 1000), Marker::Minute);
        assert_eq!(f.bitpos(), 1);
    }

    #[test]
    fn test_marker_early_truncates_minute_but_is_not_late() {
        // A begin-of-minute marker arriving well before slot 59 just
        // resynchronizes the framer; it is not classified any differently
        // than an on-time one (the resulting short minute is the frame
        // decoder's concern via `minlen`, not the framer's).
        let mut f = MinuteFramer::new();
        for _ in 0..40 {
            assert_eq!(f.push_symbol(Symbol::Zero, 1000), Marker::None);
        }
        assert_eq!(f.push_symbol(Symbol::BeginOfMinute, 1000), Marker::Minute);
        assert_eq!(f.bitpos(), 1);
    }

    #[test]
    fn test_marker_right_after_toolong_is_late() {
        // Only a begin-of-minute marker arriving on the very next second
        // after a `TooLong` overflow is classified `Late` (a 61-bit minute,
        // e.g. one carrying a leap second, rather than a genuinely
        // unsynchronized receiver).
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::BeginOfMinute, 500); // bitpos -> 1
        for _ in 0..59 {
            assert_eq!(f.push_symbol(Symbol::One, 1000), Marker::None);
        }
        // 60th ordinary bit overflows bitpos past 60.
        assert_eq!(f.push_symbol(Symbol::One, 1000), Marker::TooLong);
        assert_eq!(f.push_symbol(Symbol::BeginOfMinute, 1000), Marker::Late);
        assert_eq!(f.bitpos(), 1);
    }

    #[test]
    fn test_toolong_eligibility_does_not_survive_a_second_call() {
        // The `Late` window is exactly one call wide: if an ordinary symbol
        // follows the overflow instead of a marker, a later begin-of-minute
        // is reported as a fresh `Minute`, not `Late`.
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::BeginOfMinute, 500);
        for _ in 0..60 {
            f.push_symbol(Symbol::One, 1000);
        }
        assert_eq!(f.push_symbol(Symbol::One, 1000), Marker::TooLong);
        assert_eq!(f.push_symbol(Symbol::Zero, 1000), Marker::None);
        assert_eq!(f.push_symbol(Symbol::BeginOfMinute, 1000), Marker::Minute);
    }

    #[test]
    fn test_missing_marker_past_60_bits_is_too_long() {
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::BeginOfMinute, 500); // bitpos -> 1
        for _ in 0..59 {
            let m = f.push_symbol(Symbol::One, 1000);
            assert_eq!(m, Marker::None);
        }
        // one more without a marker overruns bitpos past 60
        assert_eq!(f.push_symbol(Symbol::One, 1000), Marker::TooLong);
        assert_eq!(f.bitpos(), 0);
    }

    #[test]
    fn test_acc_minlen_accumulates_even_on_unreadable_second() {
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::None, 997);
        f.push_symbol(Symbol::None, 1003);
        assert_eq!(f.acc_minlen, 2000);
    }

    #[test]
    fn test_take_minute_snapshots_without_clearing() {
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::BeginOfMinute, 500);
        f.push_symbol(Symbol::Zero, 1000);
        let done = f.take_minute();
        assert_eq!(done[0], Some(4));
        assert_eq!(done[1], Some(0));
        // buffer is not cleared: an unreadable second next minute would
        // retain this value rather than going blank.
        assert_eq!(f.buffer()[1], Some(0));
    }

    #[test]
    fn test_unreadable_second_retains_previous_slot_value() {
        let mut f = MinuteFramer::new();
        f.push_symbol(Symbol::BeginOfMinute, 500);
        f.push_symbol(Symbol::Two, 1000); // slot 1 = Some(3)
        let _ = f.take_minute();
        f.push_symbol(Symbol::BeginOfMinute, 500); // new minute, bitpos -> 1
        f.push_symbol(Symbol::None, 1000); // slot 1 unreadable this minute
        assert_eq!(f.buffer()[1], Some(3));
    }
}
