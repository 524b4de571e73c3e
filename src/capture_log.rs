//! The capture-log text format: a byte-exact alphabet recording one
//! character per decoded second, so a session can be replayed bit-for-bit
//! later. Ported from `input.c`'s `append_logfile`/`get_bit_file` and the
//! live-mode marker writes scattered through `collect_pulses`/`get_bit_live`.

use crate::symbol::{HardwareStatus, Symbol};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One event recovered from a capture log during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A decoded second, with its approximate elapsed-time contribution
    /// (the replay alphabet does not store sample counts, only a nominal
    /// 1000/1500 ms per the reference `get_bit_file`).
    Symbol(Symbol, u32),
    HardwareStatus(HardwareStatus, u32),
    BadIo,
    /// `a<value>`: a verbatim accumulated-minute-length checkpoint.
    AccMinlen(u32),
    Eof,
}

/// Appends one character per second to a capture-log file, with a
/// background thread that flushes it every 60 seconds (mirroring the
/// reference's detached `flush_logfile` pthread).
pub struct CaptureWriter {
    file: Arc<Mutex<File>>,
}

impl CaptureWriter {
    pub fn open(path: &str) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(b"\n--new log--\n\n")?;
        let file = Arc::new(Mutex::new(file));
        let flushed = Arc::clone(&file);
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(60));
            if let Ok(mut f) = flushed.lock() {
                let _ = f.flush();
            }
        });
        Ok(CaptureWriter { file })
    }

    fn write_char(&self, c: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        let s = c.encode_utf8(&mut buf);
        self.file.lock().unwrap().write_all(s.as_bytes())
    }

    /// Writes the single character for a decoded second (`0..4`, `x`, `r`,
    /// `#`, `_`), matching `get_bit_live`'s `outch`.
    pub fn write_symbol(&self, symbol: Symbol) -> io::Result<()> {
        match symbol.code() {
            Some(code) => self.write_char((b'0' + code) as char),
            None => self.write_char('_'),
        }
    }

    pub fn write_hardware_status(&self, status: HardwareStatus) -> io::Result<()> {
        let c = match status {
            HardwareStatus::Ok => return Ok(()),
            HardwareStatus::ReceiveOnly => 'r',
            HardwareStatus::Transmit => 'x',
            HardwareStatus::Random => '#',
        };
        self.write_char(c)
    }

    pub fn write_bad_io(&self) -> io::Result<()> {
        self.write_char('*')
    }

    /// A bit-timing reset marker (`<`, `>`, `!`), written mid-second before
    /// the symbol character.
    pub fn write_reset_marker(&self, c: char) -> io::Result<()> {
        self.write_char(c)
    }

    /// Writes `a<value>\n`, the accumulated-minute-length checkpoint
    /// emitted whenever a begin-of-minute marker (on time or late) is seen.
    pub fn write_acc_minlen(&self, acc_minlen: u32) -> io::Result<()> {
        let mut f = self.file.lock().unwrap();
        writeln!(f, "a{}", acc_minlen)
    }
}

/// Drives a [`CaptureWriter`] from the main loop: one call per decoded
/// second (plus any mid-second reset markers) and one call per completed
/// minute, mirroring `get_bit_live`'s own `fprintf(logfile, ...)` calls in
/// `input.c`. Errors are swallowed (as in the reference, which never checks
/// `fprintf`'s return value) since a capture-log write failure must never
/// abort decoding.
pub trait CaptureSink {
    fn write_reset_marker(&mut self, c: char);
    fn write_symbol(&mut self, symbol: Symbol);
    fn write_hardware_status(&mut self, status: HardwareStatus);
    fn write_bad_io(&mut self);
    fn write_acc_minlen(&mut self, acc_minlen: u32);
}

impl CaptureSink for CaptureWriter {
    fn write_reset_marker(&mut self, c: char) {
        let _ = CaptureWriter::write_reset_marker(self, c);
    }

    fn write_symbol(&mut self, symbol: Symbol) {
        let _ = CaptureWriter::write_symbol(self, symbol);
    }

    fn write_hardware_status(&mut self, status: HardwareStatus) {
        let _ = CaptureWriter::write_hardware_status(self, status);
    }

    fn write_bad_io(&mut self) {
        let _ = CaptureWriter::write_bad_io(self);
    }

    fn write_acc_minlen(&mut self, acc_minlen: u32) {
        let _ = CaptureWriter::write_acc_minlen(self, acc_minlen);
    }
}

/// Characters accepted anywhere in the capture-log alphabet; everything
/// else is skipped, matching `skip_invalid`'s `strchr` allow-list. Only
/// symbol codes `0..=4` are meaningful (`spec.md` §3); a stray `5` is not
/// part of the decoded alphabet and must not be let through, or
/// [`CaptureReader::next_event`]'s digit match would have nowhere to send it.
const ALPHABET: &[u8] = b"01234\nxr#*_a";

/// Replays a previously written capture log one event at a time.
pub struct CaptureReader<R> {
    inner: BufReader<R>,
    pending: Option<u8>,
}

impl CaptureReader<File> {
    pub fn open(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(CaptureReader::new(file))
    }
}

impl<R: Read> CaptureReader<R> {
    pub fn new(inner: R) -> Self {
        CaptureReader {
            inner: BufReader::new(inner),
            pending: None,
        }
    }

    /// Reads one raw byte, normalizing a lone `\r` (not followed by `\n`)
    /// to `\n`, and skipping any byte outside [`ALPHABET`].
    fn next_alphabet_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            let mut buf = [0u8; 1];
            let b = if let Some(b) = self.pending.take() {
                b
            } else {
                match self.inner.read(&mut buf)? {
                    0 => return Ok(None),
                    _ => buf[0],
                }
            };
            let b = if b == b'\r' {
                let mut peek = [0u8; 1];
                match self.inner.read(&mut peek)? {
                    0 => b'\n',
                    _ if peek[0] == b'\n' => b'\n',
                    _ => {
                        self.pending = Some(peek[0]);
                        b'\n'
                    }
                }
            } else {
                b
            };
            if ALPHABET.contains(&b) {
                return Ok(Some(b));
            }
        }
    }

    /// Reads the next event from the log.
    pub fn next_event(&mut self) -> io::Result<LogEvent> {
        let b = match self.next_alphabet_byte()? {
            Some(b) => b,
            None => return Ok(LogEvent::Eof),
        };
        match b {
            b'0'..=b'4' => {
                let code = b - b'0';
                let symbol = match code {
                    0 => Symbol::Zero,
                    1 => Symbol::One,
                    2 => Symbol::Split,
                    3 => Symbol::Two,
                    _ => Symbol::BeginOfMinute,
                };
                Ok(LogEvent::Symbol(symbol, 1000))
            }
            b'x' => Ok(LogEvent::HardwareStatus(HardwareStatus::Transmit, 1500)),
            b'r' => Ok(LogEvent::HardwareStatus(HardwareStatus::ReceiveOnly, 1500)),
            b'#' => Ok(LogEvent::HardwareStatus(HardwareStatus::Random, 1500)),
            b'*' => Ok(LogEvent::BadIo),
            b'_' => Ok(LogEvent::Symbol(Symbol::None, 1000)),
            b'a' => {
                let mut digits = Vec::new();
                loop {
                    let mut one = [0u8; 1];
                    match self.inner.read(&mut one)? {
                        0 => break,
                        _ if one[0].is_ascii_digit() && digits.len() < 10 => digits.push(one[0]),
                        _ => {
                            self.pending = Some(one[0]);
                            break;
                        }
                    }
                }
                let text = String::from_utf8_lossy(&digits);
                match text.parse::<u32>() {
                    Ok(v) => Ok(LogEvent::AccMinlen(v)),
                    Err(_) => Ok(LogEvent::Eof),
                }
            }
            b'\n' => {
                // A bare newline carries no information of its own; recurse
                // to the next meaningful byte.
                self.next_event()
            }
            _ => unreachable!("filtered by ALPHABET"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_parses_digit_events() {
        let mut r = CaptureReader::new(Cursor::new(b"01234".to_vec()));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::One, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Split, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Two, 1000));
        assert_eq!(
            r.next_event().unwrap(),
            LogEvent::Symbol(Symbol::BeginOfMinute, 1000)
        );
        assert_eq!(r.next_event().unwrap(), LogEvent::Eof);
    }

    #[test]
    fn test_reader_skips_non_alphabet_bytes() {
        let mut r = CaptureReader::new(Cursor::new(b"  0\t1  ".to_vec()));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::One, 1000));
    }

    #[test]
    fn test_reader_skips_reset_markers_and_the_stray_five() {
        // '<', '>', '!' are write-side-only diagnostics; '5' was never a
        // valid symbol code. Neither belongs to the replay alphabet.
        let mut r = CaptureReader::new(Cursor::new(b"<5>0!1".to_vec()));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::One, 1000));
    }

    #[test]
    fn test_writer_then_reader_round_trips_a_minute() {
        let path = std::env::temp_dir().join(format!("nplpi-test-{:?}.log", std::thread::current().id()));
        let path_str = path.to_str().unwrap().to_string();
        {
            let mut w = CaptureWriter::open(&path_str).unwrap();
            CaptureSink::write_symbol(&mut w, Symbol::Zero);
            CaptureSink::write_acc_minlen(&mut w, 60_000);
        }
        let mut r = CaptureReader::open(&path_str).unwrap();
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::AccMinlen(60_000));
        let _ = std::fs::remove_file(&path_str);
    }

    #[test]
    fn test_reader_parses_acc_minlen() {
        let mut r = CaptureReader::new(Cursor::new(b"a12345\n0".to_vec()));
        assert_eq!(r.next_event().unwrap(), LogEvent::AccMinlen(12345));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
    }

    #[test]
    fn test_reader_normalizes_bare_cr_to_newline() {
        let mut r = CaptureReader::new(Cursor::new(b"0\r1".to_vec()));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::Zero, 1000));
        assert_eq!(r.next_event().unwrap(), LogEvent::Symbol(Symbol::One, 1000));
    }

    #[test]
    fn test_reader_hardware_status_chars() {
        let mut r = CaptureReader::new(Cursor::new(b"xr#*".to_vec()));
        assert_eq!(
            r.next_event().unwrap(),
            LogEvent::HardwareStatus(HardwareStatus::Transmit, 1500)
        );
        assert_eq!(
            r.next_event().unwrap(),
            LogEvent::HardwareStatus(HardwareStatus::ReceiveOnly, 1500)
        );
        assert_eq!(
            r.next_event().unwrap(),
            LogEvent::HardwareStatus(HardwareStatus::Random, 1500)
        );
        assert_eq!(r.next_event().unwrap(), LogEvent::BadIo);
    }
}
