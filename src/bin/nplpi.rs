//! Live NPL receiver daemon: reads the configured GPIO pin, decodes the
//! time code, appends a capture log, and optionally steps the host clock.
//! Ported from the live-mode path of `input.c`/`mainloop.c`.

use clap::Parser;
use log::error;
use nplpi::config::Config;
use nplpi::display::NullSink;
use nplpi::error::exit_code;
use nplpi::mainloop::{LiveBitSource, MainLoop};
use nplpi::setclock::NoopClockSetter;
use std::process::ExitCode;

#[cfg(unix)]
use nplpi::setclock::UnixClockSetter;

#[derive(Parser)]
#[command(name = "nplpi", about = "Decode the NPL 60 kHz time code from a GPIO pin")]
struct Args {
    /// JSON configuration file describing the GPIO pin and sample rate.
    #[arg(long)]
    config: String,
    /// Capture-log file to append decoded seconds to.
    logfile: String,
    /// Step the host clock once a minute decodes cleanly.
    #[arg(long)]
    settime: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let mut log_writer = match nplpi::capture_log::CaptureWriter::open(&args.logfile) {
        Ok(w) => w,
        Err(e) => {
            error!("opening capture log: {}", e);
            return ExitCode::from(1);
        }
    };

    #[cfg(target_os = "linux")]
    let pin = match nplpi::gpio::linux::LinuxSysfsPin::open(&config) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    #[cfg(target_os = "freebsd")]
    let pin = match nplpi::gpio::freebsd::FreeBsdGpioPin::open(&config) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
    {
        error!("no GPIO interface available on this platform");
        return ExitCode::from(exit_code::DATA_ERR as u8);
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        let mut source = LiveBitSource::new(pin, config.freq);
        let mut sink = NullSink;
        let mut main_loop = MainLoop::new();

        #[cfg(unix)]
        {
            let mut clock_setter = UnixClockSetter;
            main_loop.run(
                &mut source,
                &mut sink,
                Some(&mut log_writer),
                Some(&mut clock_setter),
                args.settime,
            );
        }
        #[cfg(not(unix))]
        {
            let mut clock_setter = NoopClockSetter;
            main_loop.run(
                &mut source,
                &mut sink,
                Some(&mut log_writer),
                Some(&mut clock_setter),
                args.settime,
            );
        }

        ExitCode::SUCCESS
    }
}
