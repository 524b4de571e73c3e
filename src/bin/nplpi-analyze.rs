//! Replays a capture log and prints the decoded time, exactly like
//! `nplpi-analyze.c`'s `main`.

use nplpi::capture_log::CaptureReader;
use nplpi::display::StdoutSink;
use nplpi::error::exit_code;
use nplpi::mainloop::{MainLoop, ReplayBitSource};
use std::process::ExitCode;

#[derive(clap::Parser)]
#[command(name = "nplpi-analyze", about = "Replay an NPL capture log")]
struct Args {
    /// Capture-log file to replay.
    infile: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match <Args as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(_) => {
            eprintln!("usage: nplpi-analyze infile");
            return ExitCode::from(exit_code::USAGE as u8);
        }
    };

    let reader = match CaptureReader::open(&args.infile) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}: {}", args.infile, e);
            return ExitCode::from(1);
        }
    };

    let mut source = ReplayBitSource::new(reader);
    let mut sink = StdoutSink;
    let mut main_loop = MainLoop::new();
    main_loop.run(&mut source, &mut sink, None, None, false);

    ExitCode::SUCCESS
}
