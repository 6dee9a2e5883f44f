use std::net::SocketAddr;
use std::thread;

use core_affinity::CoreId;
use log::{debug, info, warn};

use crate::bounce::{run_rank, Outcome};
use crate::config::Config;
use crate::error::Error;
use crate::message::{Communicator, LocalCommunicator, TcpHost};
use crate::report::Reporter;
use crate::termination::Termination;

pub type BoxedReporter = Box<dyn Reporter + Send>;

/**
 * Run a whole world of `size` ranks as threads of this process, over the
 * in-process transport. Only the designated root gets `termination` and the
 * reporter; the other ranks get flags of their own that nothing trips, the
 * same as peer processes that never receive the signal. With `pin`, rank `r`
 * is pinned to core `r % num_cores`.
 */
pub fn run_local(
    config: &Config,
    size: usize,
    termination: Termination,
    reporter: BoxedReporter,
    pin: bool,
) -> Result<Vec<Outcome>, Error> {
    let cores = if pin { core_ids() } else { Vec::new() };
    let mut reporter = Some(reporter);

    let procs = LocalCommunicator::world(size)
        .into_iter()
        .map(|comm| {
            let rank = comm.rank();
            let config = config.clone();
            let core = cores.get(rank % cores.len().max(1)).copied();
            let (termination, mut reporter) = if rank == config.root {
                (termination.clone(), reporter.take())
            } else {
                (Termination::new(), None)
            };

            thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                        debug!("rank {} pinned to core {}", rank, core.id);
                    }
                    let reporter = reporter.as_deref_mut().map(|r| r as &mut dyn Reporter);
                    run_rank(&comm, &config, &termination, reporter)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let results: Vec<_> = procs
        .into_iter()
        .map(|p| {
            p.join()
                .unwrap_or_else(|_| Err(Error::Transport("rank thread panicked".into())))
        })
        .collect();
    results.into_iter().collect()
}

/// Run this process as rank `rank` of a TCP world whose addresses, ordered by
/// rank, are `peers`. Queued messages are flushed before returning.
pub fn run_tcp(
    config: &Config,
    rank: usize,
    peers: Vec<SocketAddr>,
    termination: &Termination,
    reporter: Option<BoxedReporter>,
) -> Result<Outcome, Error> {
    let (host, comm) = TcpHost::new(rank, peers, config.ball_size)?;
    info!("startup complete for rank {} of {}", rank, comm.size());

    let mut reporter = reporter;
    let outcome = run_rank(
        &comm,
        config,
        termination,
        reporter.as_deref_mut().map(|r| r as &mut dyn Reporter),
    );

    drop(comm);
    host.join()?;
    outcome
}

fn core_ids() -> Vec<CoreId> {
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    if cores.is_empty() {
        warn!("core ids are unavailable, rank threads will not be pinned");
    }
    cores
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::bounce::Cause;
    use crate::config::Method;
    use crate::report::WriteReporter;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// A `Write` whose bytes can be inspected after the reporter has been
    /// moved onto the root's thread.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn local_world_runs_to_completion() {
        for &method in Method::ALL.iter() {
            let out = Shared::default();
            let config = Config::new(1024, 2, method, 5, 3).unwrap();
            let outcomes = run_local(
                &config,
                3,
                Termination::new(),
                Box::new(WriteReporter::new(out.clone())),
                true,
            )
            .unwrap();

            assert_eq!(outcomes.len(), 3);
            assert!(outcomes
                .iter()
                .all(|o| o.rounds == 2 && o.cause == Cause::Completed));
            let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
            assert_eq!(text, "Started round 0\nStarted round 1\n");
        }
    }

    #[test]
    fn local_world_with_propagation_stops_on_a_root_signal() {
        let config = Config::new(64, -1, Method::RotatingBroadcast, 0, 4)
            .unwrap()
            .with_propagated_termination(true);
        let termination = Termination::new();
        termination.fire(7);

        let out = Shared::default();
        let outcomes = run_local(
            &config,
            4,
            termination,
            Box::new(WriteReporter::new(out.clone())),
            false,
        )
        .unwrap();

        assert_eq!(outcomes[0].cause, Cause::Terminated(7));
        assert!(outcomes[1..].iter().all(|o| o.cause == Cause::Terminated(0)));
        assert!(outcomes.iter().all(|o| o.rounds == 0));
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "Early termination on signal 7 at round 0 in rank 0 of 4\n");
    }
}
