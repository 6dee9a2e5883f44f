use std::fmt;
use std::str::FromStr;

use log::info;

use crate::error::Error;

/// Ball size used when none is given on the command line.
pub const DEFAULT_BALL_SIZE: usize = 8192;




/**
 * The two ways of passing the ball around. The choice is made once, before
 * circulation starts, and must agree across all ranks.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Point-to-point: every rank receives from its predecessor and sends to
    /// its successor.
    RingRelay,
    /// Collective: one rank broadcasts per step, the source rotates.
    RotatingBroadcast,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::RingRelay, Method::RotatingBroadcast];

    pub fn name(&self) -> &'static str {
        match self {
            Method::RingRelay => "sendrecv",
            Method::RotatingBroadcast => "broadcast",
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::RingRelay
    }
}

impl fmt::Display for Method {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sendrecv" | "ring-relay" => Ok(Method::RingRelay),
            "broadcast" | "rotating-broadcast" => Ok(Method::RotatingBroadcast),
            _ => Err(Error::Config(format!("unknown bounce method: {}", s))),
        }
    }
}




/**
 * Immutable run configuration, built once at startup and handed to every
 * rank. The root rank is stored already reduced into `[0, world_size)`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ball_size: usize,
    pub rounds: i64,
    pub method: Method,
    pub root: usize,
    pub propagate_termination: bool,
}

impl Config {
    /// Build a configuration for a world of `world_size` ranks. The requested
    /// root must be a non-negative `i32`; it is reduced modulo the world
    /// size.
    pub fn new(
        ball_size: usize,
        rounds: i64,
        method: Method,
        root_rank: i64,
        world_size: usize,
    ) -> Result<Self, Error> {
        if ball_size == 0 {
            return Err(Error::Config("ball size must be positive".into()));
        }
        if world_size == 0 {
            return Err(Error::Config("world must contain at least one rank".into()));
        }
        if root_rank < 0 || root_rank > i64::from(i32::MAX) {
            return Err(Error::Config(format!(
                "invalid rank index (out of range) provided to -R/--root-rank: {}",
                root_rank
            )));
        }
        let root = root_rank as usize % world_size;
        info!("root rank {} reduces to {}", root_rank, root);

        Ok(Self {
            ball_size,
            rounds,
            method,
            root,
            propagate_termination: false,
        })
    }

    pub fn with_propagated_termination(mut self, enabled: bool) -> Self {
        self.propagate_termination = enabled;
        self
    }

    /// True if the round target has been met. A negative target is never met.
    pub fn target_reached(&self, round: u64) -> bool {
        self.rounds >= 0 && round >= self.rounds as u64
    }

    /// True when the run should set up and tear down without passing the
    /// ball at all.
    pub fn skips_circulation(&self) -> bool {
        self.rounds == 0
    }
}




/// Split an unsigned number into its radix and digits: `0x` or `0X` for
/// hexadecimal, a leading `0` followed by a digit for octal, else decimal.
fn split_radix(s: &str) -> (u32, &str) {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, hex)
    } else if s.len() > 1 && s.starts_with('0') && s.as_bytes()[1].is_ascii_digit() {
        (8, &s[1..])
    } else {
        (10, s)
    }
}

/// Parse a signed integer the way the round and root options are read:
/// optional sign, then a hexadecimal, octal, or decimal body.
pub fn parse_integer(s: &str) -> Result<i64, Error> {
    let invalid = || Error::Config(format!("invalid integer: {}", s));

    let trimmed = s.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (radix, digits) = split_radix(unsigned);

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let value = if negative {
        i64::from_str_radix(&format!("-{}", digits), radix)
    } else {
        i64::from_str_radix(digits, radix)
    };
    value.map_err(|_| invalid())
}

/**
 * Parse a human readable byte size: `#{.#}{TGMK{i}{B}}`, case-insensitive.
 * A leading `0x` reads hexadecimal and a leading `0` reads octal. The `i`
 * suffix selects binary (1024) rather than decimal (1000) multipliers. Zero,
 * trailing garbage, and overflow are all rejected.
 */
pub fn parse_byte_size(s: &str) -> Result<usize, Error> {
    let invalid = || Error::Config(format!("invalid memory size: {}", s));

    let (radix, body) = split_radix(s.trim_start());

    let digits_end = body
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or_else(|| body.len());
    let (digits, suffix) = body.split_at(digits_end);

    if digits.is_empty() {
        return Err(invalid());
    }
    let value = u64::from_str_radix(digits, radix).map_err(|_| invalid())?;

    let mut rest = suffix.trim_start().chars().peekable();
    let magnitude = match rest.peek().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        _ => 0,
    };
    if magnitude > 0 {
        rest.next();
    }
    let base: u64 = if rest.peek().map_or(false, |c| c.eq_ignore_ascii_case(&'i')) {
        rest.next();
        1024
    } else {
        1000
    };
    if rest.peek().map_or(false, |c| c.eq_ignore_ascii_case(&'b')) {
        rest.next();
    }
    if rest.next().is_some() {
        return Err(invalid());
    }

    let bytes = (0..magnitude)
        .try_fold(value, |acc, _| acc.checked_mul(base))
        .ok_or_else(invalid)?;

    match bytes {
        0 => Err(invalid()),
        n if n > usize::MAX as u64 => Err(invalid()),
        n => Ok(n as usize),
    }
}
