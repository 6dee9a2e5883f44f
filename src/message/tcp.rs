use std::collections::HashMap;
use std::io::prelude::*;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::backoff::{ExponentialBackoff, Retry};
use super::comm::{Communicator, Tag};
use super::mailbox::{Envelope, Mailbox, ENVELOPE_OVERHEAD};
use super::util;
use crate::error::Error;

const RETRY_WAIT: Duration = Duration::from_millis(250);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(5000);
const CONNECT_ATTEMPTS: usize = 20;

type Outbound = (usize, Envelope);

/// Owns the threads behind a [TcpCommunicator]: a listener that accepts
/// connections from peers and decodes their frames into the inbound channel,
/// and a serial sender that keeps one connection per destination.
///
/// Frames are a little-endian `usize` length followed by an `rmp-serde`
/// encoded [Envelope]; the receiver acknowledges each frame by echoing its
/// length. A frame longer than the largest message the host was created for
/// closes the connection it arrived on.
pub struct TcpHost {
    send_thread: Option<JoinHandle<Result<(), Error>>>,
    _listen_thread: JoinHandle<()>,
}

impl TcpHost {
    /// Bind this rank's address and start the transport threads. Returns the
    /// host and the communicator that talks through it. `max_message` is the
    /// largest payload any peer will send.
    pub fn new(
        rank: usize,
        peers: Vec<SocketAddr>,
        max_message: usize,
    ) -> Result<(Self, TcpCommunicator), Error> {
        let addr = *peers.get(rank).ok_or_else(|| {
            Error::Config(format!("rank {} has no address among {} peers", rank, peers.len()))
        })?;
        let listener = TcpListener::bind(addr)?;
        info!("Listening to: {}", addr);

        let (recv_sink, recv_src) = crossbeam_channel::unbounded();
        let max_frame = max_message.saturating_add(ENVELOPE_OVERHEAD);
        let listen_thread = Self::start_listener(listener, recv_sink, max_frame);

        let (send_sink, send_src) = crossbeam_channel::unbounded();
        let send_thread = Self::start_serial_sender(peers.clone(), send_src);

        let host = TcpHost {
            send_thread: Some(send_thread),
            _listen_thread: listen_thread,
        };
        let comm = TcpCommunicator {
            rank,
            num_peers: peers.len(),
            send_sink: Some(send_sink),
            mailbox: Mailbox::new(recv_src),
        };
        Ok((host, comm))
    }

    /// Wait for every queued message to be delivered. The communicator must
    /// have been dropped first, otherwise this never returns.
    pub fn join(mut self) -> Result<(), Error> {
        match self.send_thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(Error::Transport("sender thread panicked".into())),
            None => Ok(()),
        }
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: Receiver<Outbound>,
    ) -> JoinHandle<Result<(), Error>> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, envelope) in send_src {
                if !table.contains_key(&rank) {
                    table.insert(rank, Self::connect_with_retry(peers[rank])?);
                }
                let stream = table
                    .get_mut(&rank)
                    .ok_or(Error::Disconnected(rank))?;

                if let Err(e) = Self::write_frame(stream, &envelope) {
                    error!("Failed to send message to {}: {}", peers[rank], e);
                    return Err(e);
                }
            }
            debug!("Outbound channel closed, sender thread exiting");
            Ok(())
        })
    }

    fn write_frame(stream: &mut TcpStream, envelope: &Envelope) -> Result<(), Error> {
        let bytes = rmp_serde::encode::to_vec(envelope)
            .map_err(|e| Error::Transport(format!("encode failed: {}", e)))?;
        let msg_sz = bytes.len();

        stream.write_all(&msg_sz.to_le_bytes())?;
        stream.write_all(&bytes)?;
        let ack = util::read_usize(stream)?;

        if ack != msg_sz {
            return Err(Error::Transport(format!(
                "bytes read by receiver did not match bytes sent: sent {} but receiver acked {}",
                msg_sz, ack
            )));
        }
        Ok(())
    }

    fn start_listener(
        listener: TcpListener,
        recv_sink: Sender<Envelope>,
        max_frame: usize,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        Self::handle_connection(stream, recv_sink.clone(), max_frame);
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }
        })
    }

    fn check_frame_size(size: usize, max_frame: usize) -> Result<(), Error> {
        if size > max_frame {
            return Err(Error::Transport(format!(
                "frame of {} bytes exceeds the limit of {}",
                size, max_frame
            )));
        }
        Ok(())
    }

    fn handle_connection(
        mut stream: TcpStream,
        recv_sink: Sender<Envelope>,
        max_frame: usize,
    ) -> JoinHandle<()> {
        let remote = stream.peer_addr().ok();
        info!("Receiving connection from {:?}", remote);

        thread::spawn(move || loop {
            let size = match util::read_usize(&mut stream) {
                Ok(size) => size,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Connection from {:?} closed", remote);
                    return;
                }
                Err(e) => {
                    error!("Connection from {:?} failed: {}", remote, e);
                    return;
                }
            };
            let received = Self::check_frame_size(size, max_frame)
                .and_then(|()| Ok(util::read_bytes_vec(&mut stream, size)?))
                .and_then(|bytes| {
                    rmp_serde::decode::from_slice::<Envelope>(&bytes)
                        .map_err(|e| Error::Transport(format!("decode failed: {}", e)))
                })
                .and_then(|envelope| {
                    recv_sink
                        .send(envelope)
                        .map_err(|_| Error::Transport("inbound channel closed".into()))
                })
                .and_then(|()| Ok(stream.write_all(&size.to_le_bytes())?));

            if let Err(e) = received {
                error!("Connection from {:?} failed: {}", remote, e);
                return;
            }
        })
    }

    fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream, Error> {
        info!("Connecting to {}...", addr);

        ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(CONNECT_ATTEMPTS)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| {
                    warn!("Connect to {} failed: {}; retrying in {:?}", addr, e, delay);
                    thread::sleep(delay);
                },
            )
            .unwrap_or_else(|| Err(std::io::ErrorKind::TimedOut.into()))
            .and_then(|stream| {
                stream.set_nodelay(true)?;
                Ok(stream)
            })
            .map_err(Error::from)
    }
}

/////////////////////////////////////////////////////
/////////////////////////////////////////////////////
/////////////////////////////////////////////////////
/////////////////////////////////////////////////////

/// A communicator for a world of processes, one rank per process, connected
/// over TCP. Sends are queued to the host's sender thread and return
/// immediately; receives block on the mailbox.
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    send_sink: Option<Sender<Outbound>>,
    mailbox: Mailbox,
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send_tagged(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        if rank >= self.num_peers {
            return Err(Error::Transport(format!(
                "no rank {} in a world of {}",
                rank, self.num_peers
            )));
        }
        let envelope = Envelope {
            source: self.rank,
            tag,
            data: message,
        };
        self.send_sink
            .as_ref()
            .ok_or(Error::Disconnected(rank))?
            .send((rank, envelope))
            .map_err(|_| Error::Transport("sender thread has stopped".into()))
    }

    fn recv_tagged(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.mailbox.recv(rank, tag)
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take();
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use std::io::{Read, Write};
    use std::net::{IpAddr, Ipv4Addr};

    fn free_peers(count: usize) -> Vec<SocketAddr> {
        let listeners: Vec<_> = (0..count)
            .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap())
            .collect();
        listeners
            .iter()
            .map(|l| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), l.local_addr().unwrap().port()))
            .collect()
    }

    #[test]
    fn ring_and_barrier_over_tcp() {
        let peers = free_peers(3);
        let procs: Vec<_> = (0..3)
            .map(|rank| {
                let peers = peers.clone();
                thread::spawn(move || {
                    let (host, comm) = TcpHost::new(rank, peers, 16).unwrap();
                    let next = (rank + 1) % comm.size();
                    let prev = (rank + comm.size() - 1) % comm.size();

                    comm.barrier().unwrap();
                    comm.send(next, &[rank as u8; 16]).unwrap();
                    let mut ball = [0; 16];
                    comm.recv(prev, &mut ball).unwrap();

                    let mut shared = [0; 4];
                    if rank == 2 {
                        shared = [9; 4];
                    }
                    comm.broadcast(2, &mut shared).unwrap();
                    comm.barrier().unwrap();

                    drop(comm);
                    host.join().unwrap();
                    (ball[0], shared)
                })
            })
            .collect();

        let results: Vec<_> = procs.into_iter().map(|p| p.join().unwrap()).collect();
        assert_eq!(results[0], (2, [9; 4]));
        assert_eq!(results[1], (0, [9; 4]));
        assert_eq!(results[2], (1, [9; 4]));
    }

    #[test]
    fn frame_limit_covers_the_largest_message() {
        assert!(TcpHost::check_frame_size(100 + ENVELOPE_OVERHEAD, 100 + ENVELOPE_OVERHEAD).is_ok());
        match TcpHost::check_frame_size(usize::MAX, 100 + ENVELOPE_OVERHEAD) {
            Err(Error::Transport(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn oversized_frame_closes_the_connection() {
        let peers = free_peers(1);
        let (host, comm) = TcpHost::new(0, peers.clone(), 16).unwrap();

        let mut stream = TcpStream::connect(peers[0]).unwrap();
        stream.write_all(&usize::MAX.to_le_bytes()).unwrap();
        let mut ack = [0; 8];
        assert!(matches!(stream.read(&mut ack), Ok(0) | Err(_)));

        comm.send(0, &[7; 16]).unwrap();
        let mut ball = [0; 16];
        comm.recv(0, &mut ball).unwrap();
        assert_eq!(ball, [7; 16]);

        drop(comm);
        host.join().unwrap();
    }
}
