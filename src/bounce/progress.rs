use log::info;

use crate::error::Error;
use crate::report::Reporter;

/// Round counter for one rank, plus the progress sink if this rank is the
/// designated root. The counter only moves forward. Nothing here
/// synchronizes with other ranks; it only formats and emits.
pub struct Progress<'a> {
    round: u64,
    reporter: Option<&'a mut dyn Reporter>,
}

impl<'a> Progress<'a> {
    pub fn new(reporter: Option<&'a mut dyn Reporter>) -> Self {
        Self { round: 0, reporter }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn advance(&mut self) {
        self.round += 1
    }

    pub fn is_reporting(&self) -> bool {
        self.reporter.is_some()
    }

    /// Emit the round boundary line, if this rank owns the sink.
    pub fn round_started(&mut self) -> Result<(), Error> {
        let line = format!("Started round {}", self.round);
        self.emit(&line)
    }

    /// Emit the final record for a run cut short by a termination signal.
    /// Ranks without the sink log it instead.
    pub fn terminated(&mut self, signal: usize, rank: usize, size: usize) -> Result<(), Error> {
        let line = format!(
            "Early termination on signal {} at round {} in rank {} of {}",
            signal, self.round, rank, size
        );
        if self.is_reporting() {
            self.emit(&line)
        } else {
            info!("{}", line);
            Ok(())
        }
    }

    pub fn finish(&mut self) -> Result<(), Error> {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.finish()?;
            info!("primary rank output closed");
        }
        Ok(())
    }

    fn emit(&mut self, line: &str) -> Result<(), Error> {
        match self.reporter.as_mut() {
            Some(reporter) => Ok(reporter.emit(line)?),
            None => Ok(()),
        }
    }
}
