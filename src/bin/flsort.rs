use std::io::Write;
use std::path::Path;
use std::process;

use clap::Parser;

use lsort_rs::cancel::{self, CancelToken};
use lsort_rs::common;
use lsort_rs::sort::{
    FlushMode, Relocation, SortBuffer, SortConfig, SortError, SortObserver, sort_in_place,
};

#[derive(Parser)]
#[command(
    name = "flsort",
    version,
    about = "Sort almost-sorted FILE(s), works in-place",
    after_help = "N may be followed by the following multiplicative suffixes:\n\
                  B=1, K=1024, and so on for M, G, T, P, E.\n\n\
                  By default, --compare is 0, meaning no limit when comparing lines.\n\
                  A non-zero value for --compare may result in non-sorted files."
)]
struct Cli {
    /// Compare no more than N bytes per line
    #[arg(short = 'c', long = "compare", value_name = "N")]
    compare: Option<String>,

    /// Maximum shift distance in bytes, 0 = unlimited
    #[arg(short = 'd', long = "distance", value_name = "N")]
    distance: Option<String>,

    /// Use synchronous writes
    #[arg(long = "sync")]
    sync: bool,

    /// Flush every relocation immediately instead of batching
    #[arg(long = "immediate")]
    immediate: bool,

    /// Sort in descending order
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// Suppress progress output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Report changes to the file
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Files to sort in place
    #[arg(required = true, value_name = "FILE")]
    files: Vec<String>,
}

/// Prints progress and relocation reports to the terminal, carriage-return
/// style: progress overwrites itself, verbose lines push it to a new row.
struct Terminal<'a> {
    file: &'a str,
    quiet: bool,
    verbose: bool,
    last_percent: Option<u64>,
}

impl<'a> Terminal<'a> {
    fn new(file: &'a str, quiet: bool, verbose: bool) -> Self {
        Terminal {
            file,
            quiet,
            verbose,
            last_percent: None,
        }
    }

    /// Move off the progress line before a diagnostic or prompt.
    fn break_line(&self) {
        if !self.quiet && self.last_percent.is_some() {
            println!();
        }
    }

    fn done(&self) {
        if !self.quiet {
            println!("\r{}: done", self.file);
        }
    }
}

impl SortObserver for Terminal<'_> {
    fn progress(&mut self, percent: u64) {
        if !self.quiet {
            print!("\r{}: {}%", self.file, percent);
            let _ = std::io::stdout().flush();
            self.last_percent = Some(percent);
        }
    }

    fn relocated(&mut self, event: Relocation) {
        if !self.verbose {
            return;
        }
        match event {
            Relocation::MovedBack { line, to } => {
                println!("\r{}:{}: moved back to line {}", self.file, line, to);
            }
            Relocation::MovedForward { line, to } => {
                println!("\r{}:{}: moved forward to line {}", self.file, line, to);
            }
        }
        if !self.quiet {
            if let Some(percent) = self.last_percent {
                print!("{}: {}%", self.file, percent);
                let _ = std::io::stdout().flush();
            }
        }
    }
}

fn stdout_is_tty() -> bool {
    #[cfg(unix)]
    return unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };

    #[cfg(not(unix))]
    false
}

fn parse_budget(value: Option<&String>, flag: &str) -> usize {
    match value {
        Some(s) => common::parse_size(s).unwrap_or_else(|e| {
            eprintln!("flsort: {}: {}", flag, e);
            process::exit(1);
        }),
        None => 0,
    }
}

fn main() {
    common::reset_sigpipe();

    let cli = Cli::parse();
    let quiet = cli.quiet || !stdout_is_tty();

    let config = SortConfig {
        max_compare: parse_budget(cli.compare.as_ref(), "--compare"),
        max_distance: parse_budget(cli.distance.as_ref(), "--distance"),
        reverse: cli.reverse,
        flush: if cli.sync {
            FlushMode::Sync
        } else {
            FlushMode::Async
        },
        immediate: cli.immediate,
    };

    let token = CancelToken::new();
    cancel::cancel_on_signals(&token);

    let mut aborted = false;
    for file in &cli.files {
        if token.is_cancelled() {
            aborted = true;
            break;
        }

        let map = match common::io::map_file_rw(Path::new(file)) {
            Ok(Some(map)) => map,
            Ok(None) => {
                // Empty file: nothing to sort.
                if !quiet {
                    println!("{}: done", file);
                }
                continue;
            }
            Err(e) => {
                eprintln!("flsort: {}: {}", file, common::io_error_msg(&e));
                process::exit(1);
            }
        };

        let mut buf = SortBuffer::Mapped(map);
        let mut terminal = Terminal::new(file, quiet, cli.verbose);
        match sort_in_place(&mut buf, &config, &token, &mut terminal) {
            Ok(_) => terminal.done(),
            Err(SortError::Cancelled) => {
                aborted = true;
                break;
            }
            Err(SortError::Io(e)) => {
                terminal.break_line();
                eprintln!("flsort: {}: {}", file, common::io_error_msg(&e));
                process::exit(1);
            }
            Err(e) => {
                terminal.break_line();
                eprintln!("{}:{}", file, e);
                process::exit(1);
            }
        }
    }

    if aborted {
        if !quiet {
            println!();
        }
        eprintln!("flsort: ABORTED");
        process::exit(1);
    }
}
