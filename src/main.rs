use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use bounce::config::{parse_byte_size, parse_integer, DEFAULT_BALL_SIZE};
use bounce::launch::{self, BoxedReporter};
use bounce::report::WriteReporter;
use bounce::termination::SIGUSR2;
use bounce::{Config, Error, Method, Termination};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use log::{debug, error, info, LevelFilter};
use simple_logger::SimpleLogger;

/// Pass a ball between ranks to exercise the transport. Send SIGUSR2 to a
/// rank to stop the run early.
#[derive(Debug, Parser)]
#[command(version, author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    /// Increase the amount of information displayed (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Size of the ball: #{.#}{TGMK{i}{B}}
    #[arg(short, long, value_parser = parse_byte_size, default_value_t = DEFAULT_BALL_SIZE)]
    size: usize,

    /// Number of rounds to pass the ball; negative runs indefinitely, zero
    /// sets up the run and exits before passing the ball
    #[arg(short, long, value_parser = parse_integer, default_value_t = -1, allow_hyphen_values = true)]
    rounds: i64,

    /// Method used to pass the ball: sendrecv, broadcast
    #[arg(short, long, default_value_t = Method::default())]
    method: Method,

    /// File to which the root rank's progress output is written, instead of
    /// stdout
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Which rank handles output and starts the ball rolling
    #[arg(
        short = 'R',
        long,
        value_parser = parse_integer,
        default_value_t = 0,
        allow_hyphen_values = true
    )]
    root_rank: i64,

    /// Run this many ranks as threads of this process
    #[arg(long, conflicts_with_all = ["rank", "peers"])]
    local: Option<usize>,

    /// Rank of this process in a TCP world
    #[arg(long, requires = "peers")]
    rank: Option<usize>,

    /// Comma-separated addresses of every rank, in rank order
    #[arg(long, value_delimiter = ',', requires = "rank")]
    peers: Vec<SocketAddr>,

    /// Pin local rank threads to CPU cores
    #[arg(long)]
    pin: bool,

    /// Carry a termination signal to every rank through the ball
    #[arg(long)]
    propagate_termination: bool,
}

impl Opts {
    fn level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    fn config(&self, world_size: usize) -> Result<Config, Error> {
        Ok(Config::new(
            self.size,
            self.rounds,
            self.method,
            self.root_rank,
            world_size,
        )?
        .with_propagated_termination(self.propagate_termination))
    }
}

/// Exit status for a command line that could not be parsed. Asking for help
/// or the version is not a failure; anything else is a configuration error.
fn usage_exit_code(e: &clap::Error) -> i32 {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => Error::Config(e.to_string()).exit_code(),
    }
}

fn open_reporter(outfile: Option<&Path>) -> Result<BoxedReporter, Error> {
    match outfile {
        Some(path) => {
            let reporter = WriteReporter::create(path).map_err(|e| {
                error!("failed to open output file `{}`: {}", path.display(), e);
                Error::Io(e)
            })?;
            info!("primary rank output file opened for writing");
            Ok(Box::new(reporter))
        }
        None => Ok(Box::new(WriteReporter::stdout())),
    }
}

fn run(opts: Opts) -> Result<(), Error> {
    let termination = Termination::new();
    debug!("registering SIGUSR2 handler");
    termination.register(SIGUSR2)?;

    match opts.rank {
        Some(rank) => {
            let config = opts.config(opts.peers.len())?;
            if rank >= opts.peers.len() {
                return Err(Error::Config(format!(
                    "rank {} is outside a world of {}",
                    rank,
                    opts.peers.len()
                )));
            }
            let reporter = if rank == config.root {
                Some(open_reporter(opts.outfile.as_deref())?)
            } else {
                None
            };
            let outcome = launch::run_tcp(&config, rank, opts.peers.clone(), &termination, reporter)?;
            info!("rank {} finished: {:?}", rank, outcome);
        }
        None => {
            let size = opts.local.unwrap_or(2);
            let config = opts.config(size)?;
            let reporter = open_reporter(opts.outfile.as_deref())?;
            let outcomes = launch::run_local(&config, size, termination, reporter, opts.pin)?;
            for outcome in outcomes {
                info!("rank {} finished: {:?}", outcome.rank, outcome);
            }
        }
    }
    Ok(())
}

fn main() {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            std::process::exit(usage_exit_code(&e));
        }
    };

    if let Err(e) = SimpleLogger::new().with_level(opts.level_filter()).init() {
        eprintln!("failed to initialize logging: {}", e);
    }
    debug!("{:?}", opts);

    if let Err(e) = run(opts) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
