use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Sink for the human-facing progress lines. Only the designated root owns
/// one. Every emitted line must be visible to an outside observer once
/// `emit` returns.
pub trait Reporter {
    fn emit(&mut self, line: &str) -> io::Result<()>;

    /// Called once when the run is over, before the closing barrier.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one line per emission to any `Write`, flushing each time.
pub struct WriteReporter<W: Write> {
    out: W,
}

impl<W: Write> WriteReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl WriteReporter<BufWriter<File>> {
    /// Create (or truncate) the output file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl WriteReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter for WriteReporter<W> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Collects the lines in memory.
impl Reporter for Vec<String> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}
