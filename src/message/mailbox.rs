use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
};

use crossbeam_channel::Receiver;
use log::debug;

use super::comm::Tag;
use crate::error::Error;

/// Upper bound on the encoded size of an [Envelope] beyond its payload.
pub const ENVELOPE_OVERHEAD: usize = 64;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// The mailbox turns the single stream of inbound envelopes into selective
/// receives: messages that arrive from a peer or with a tag nobody is waiting
/// for yet are kept, in arrival order, until a matching receive is posted.
pub struct Mailbox {
    inbound: Receiver<Envelope>,
    buffer: RefCell<HashMap<(usize, Tag), VecDeque<Vec<u8>>>>,
}

impl Mailbox {
    pub fn new(inbound: Receiver<Envelope>) -> Self {
        Self {
            inbound,
            buffer: RefCell::new(HashMap::new()),
        }
    }

    /// Block until a message from `source` with `tag` is available.
    pub fn recv(&self, source: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        if let Some(data) = self
            .buffer
            .borrow_mut()
            .get_mut(&(source, tag))
            .and_then(VecDeque::pop_front)
        {
            return Ok(data);
        }

        loop {
            let env = self
                .inbound
                .recv()
                .map_err(|_| Error::Disconnected(source))?;

            if env.source == source && env.tag == tag {
                return Ok(env.data);
            }
            debug!(
                "Message from {} ({:?}) arrived while waiting on {} ({:?}), buffering",
                env.source, env.tag, source, tag
            );
            self.buffer
                .borrow_mut()
                .entry((env.source, env.tag))
                .or_insert_with(VecDeque::new)
                .push_back(env.data)
        }
    }

    /// Number of messages received but not yet claimed.
    pub fn pending(&self) -> usize {
        self.buffer.borrow().values().map(VecDeque::len).sum::<usize>() + self.inbound.len()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn envelope(source: usize, tag: Tag, byte: u8) -> Envelope {
        Envelope {
            source,
            tag,
            data: vec![byte],
        }
    }

    #[test]
    fn receives_are_selective_and_fifo_per_source() {
        let (sink, src) = crossbeam_channel::unbounded();
        let mailbox = Mailbox::new(src);

        sink.send(envelope(2, Tag::Ball, 20)).unwrap();
        sink.send(envelope(1, Tag::Ball, 10)).unwrap();
        sink.send(envelope(2, Tag::Ball, 21)).unwrap();
        sink.send(envelope(1, Tag::Barrier, 11)).unwrap();

        assert_eq!(mailbox.recv(1, Tag::Barrier).unwrap(), vec![11]);
        assert_eq!(mailbox.recv(2, Tag::Ball).unwrap(), vec![20]);
        assert_eq!(mailbox.recv(2, Tag::Ball).unwrap(), vec![21]);
        assert_eq!(mailbox.recv(1, Tag::Ball).unwrap(), vec![10]);
        assert_eq!(mailbox.pending(), 0);
    }

    #[test]
    fn disconnected_inbound_is_an_error() {
        let (sink, src) = crossbeam_channel::unbounded();
        let mailbox = Mailbox::new(src);
        sink.send(envelope(0, Tag::Broadcast, 1)).unwrap();
        drop(sink);

        match mailbox.recv(3, Tag::Ball) {
            Err(Error::Disconnected(3)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(mailbox.pending(), 1);
    }

    #[test]
    fn encoded_payload_costs_one_byte_per_byte() {
        let data = vec![0xff; 1000];
        let bytes = rmp_serde::encode::to_vec(&Envelope {
            source: usize::MAX,
            tag: Tag::Broadcast,
            data: data.clone(),
        })
        .unwrap();
        assert!(bytes.len() <= data.len() + ENVELOPE_OVERHEAD);

        let decoded: Envelope = rmp_serde::decode::from_slice(&bytes).unwrap();
        assert_eq!(decoded.source, usize::MAX);
        assert_eq!(decoded.tag, Tag::Broadcast);
        assert_eq!(decoded.data, data);
    }
}
