//! Communicator
//!
//! Blocking point-to-point and collective messaging among a fixed group of cooperating participants.
//! The elimination only talks to the outside world through the [`Communicator`] trait, so that it runs
//! unchanged on a single participant ([`SingleProcessCommunicator`]), on a group of threads that behave
//! like separate processes ([`LocalGroup`]), or on separate MPI processes (`MpiCommunicator`, behind the
//! `mpi_communicator` feature).
//!
//! The collective operations have default implementations on top of `send` and `receive`: the root sends to
//! or receives from every other participant in increasing rank order. Every participant must call the same
//! collective with the same root, otherwise the group blocks; a participant that leaves the group makes every
//! peer waiting on it fail with [`RankError::PeerDisconnected`].
//!
//! Every message must be serializable so that it can cross a process boundary; [`encode_message`] defines
//! the bytes on the wire. Finite `f64` values survive the round trip bit for bit.
//!

use super::error::*;
use super::util::*;
use crate::parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

/// anything that can be sent to another participant
pub trait Message: Serialize + DeserializeOwned + Send + 'static {}

impl<T: Serialize + DeserializeOwned + Send + 'static> Message for T {}

/// a message in flight; values are moved between participants, never shared
pub enum Envelope {
    /// the value itself, moved to a peer in the same address space
    Value(Box<dyn Any + Send>),
    /// the value encoded by [`encode_message`]
    Bytes(Vec<u8>),
}

pub fn encode_message<T: Message>(value: &T) -> RankResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// bytes that do not decode into `T` mean the peer is at a different step of the protocol
pub fn decode_message<T: Message>(bytes: &[u8], source: ProcessRank) -> RankResult<T> {
    serde_json::from_slice(bytes).map_err(|_| RankError::UnexpectedMessage { peer: source })
}

pub trait Communicator {
    /// the rank of this participant, in `[0, size)`
    fn rank(&self) -> ProcessRank;

    /// the number of participants in the group
    fn size(&self) -> usize;

    /// send a value to `dest`; returns without waiting for the peer to receive it
    fn send<T: Message>(&self, value: T, dest: ProcessRank) -> RankResult<()>;

    /// block until a value arrives from `source`; values from the same source arrive in the order they are sent
    fn receive<T: Message>(&self, source: ProcessRank) -> RankResult<T>;

    fn is_root(&self, root: ProcessRank) -> bool {
        self.rank() == root
    }

    fn check_peer(&self, peer: ProcessRank) -> RankResult<()> {
        if peer >= self.size() {
            return Err(RankError::InvalidPeer { peer, size: self.size() });
        }
        Ok(())
    }

    /// after returning, `value` at every participant equals the `value` passed in by `root`
    fn broadcast<T: Message + Clone>(&self, value: &mut T, root: ProcessRank) -> RankResult<()> {
        self.check_peer(root)?;
        if self.is_root(root) {
            for dest in (0..self.size()).filter(|&dest| dest != root) {
                self.send(value.clone(), dest)?;
            }
        } else {
            *value = self.receive(root)?;
        }
        Ok(())
    }

    /// collect one value from every participant at `root`, ordered by rank; `None` at every other participant
    fn gather<T: Message>(&self, value: T, root: ProcessRank) -> RankResult<Option<Vec<T>>> {
        self.check_peer(root)?;
        if !self.is_root(root) {
            self.send(value, root)?;
            return Ok(None);
        }
        let mut values = Vec::with_capacity(self.size());
        for source in 0..root {
            values.push(self.receive(source)?);
        }
        values.push(value);
        for source in root + 1..self.size() {
            values.push(self.receive(source)?);
        }
        Ok(Some(values))
    }

    /// the sum of `value` over all participants, delivered to every participant
    fn reduce_sum(&self, value: usize) -> RankResult<usize> {
        let mut sum = match self.gather(value, ROOT_PROCESS)? {
            Some(values) => values.into_iter().sum(),
            None => 0,
        };
        self.broadcast(&mut sum, ROOT_PROCESS)?;
        Ok(sum)
    }
}

fn open_envelope<T: Message>(envelope: Envelope, source: ProcessRank) -> RankResult<T> {
    match envelope {
        Envelope::Value(value) => value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| RankError::UnexpectedMessage { peer: source }),
        Envelope::Bytes(bytes) => decode_message(&bytes, source),
    }
}

/// the only participant of a group of size 1; messages sent to itself are queued locally
#[derive(Default)]
pub struct SingleProcessCommunicator {
    mailbox: Mutex<VecDeque<Envelope>>,
}

impl SingleProcessCommunicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for SingleProcessCommunicator {
    fn rank(&self) -> ProcessRank {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send<T: Message>(&self, value: T, dest: ProcessRank) -> RankResult<()> {
        self.check_peer(dest)?;
        self.mailbox.lock().push_back(Envelope::Value(Box::new(value)));
        Ok(())
    }

    /// a real transport would block forever on an empty mailbox, here it is reported instead
    fn receive<T: Message>(&self, source: ProcessRank) -> RankResult<T> {
        self.check_peer(source)?;
        let envelope = self
            .mailbox
            .lock()
            .pop_front()
            .ok_or(RankError::UnexpectedMessage { peer: source })?;
        open_envelope(envelope, source)
    }
}

/// one participant of a [`LocalGroup`], connected to every peer (itself included) by a dedicated FIFO channel
pub struct ThreadCommunicator {
    rank: ProcessRank,
    /// indexed by destination rank
    senders: Vec<Sender<Envelope>>,
    /// indexed by source rank
    receivers: Vec<Receiver<Envelope>>,
    /// encode every message as if it crossed a process boundary
    serialize_messages: bool,
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> ProcessRank {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send<T: Message>(&self, value: T, dest: ProcessRank) -> RankResult<()> {
        self.check_peer(dest)?;
        let envelope = if self.serialize_messages {
            Envelope::Bytes(encode_message(&value)?)
        } else {
            Envelope::Value(Box::new(value))
        };
        self.senders[dest]
            .send(envelope)
            .map_err(|_| RankError::PeerDisconnected { peer: dest })
    }

    fn receive<T: Message>(&self, source: ProcessRank) -> RankResult<T> {
        self.check_peer(source)?;
        let envelope = self.receivers[source]
            .recv()
            .map_err(|_| RankError::PeerDisconnected { peer: source })?;
        open_envelope(envelope, source)
    }
}

/// a process group whose participants are threads of the current process
pub struct LocalGroup {}

impl LocalGroup {
    /// fully connected communicators, the i-th one has rank i
    pub fn communicators(size: usize) -> RankResult<Vec<ThreadCommunicator>> {
        Self::build_communicators(size, false)
    }

    /// like [`LocalGroup::communicators`], but every message is encoded into bytes and decoded by the receiver
    pub fn serialized_communicators(size: usize) -> RankResult<Vec<ThreadCommunicator>> {
        Self::build_communicators(size, true)
    }

    fn build_communicators(size: usize, serialize_messages: bool) -> RankResult<Vec<ThreadCommunicator>> {
        if size == 0 {
            return Err(RankError::EmptyGroup);
        }
        let mut senders: Vec<Vec<Sender<Envelope>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Envelope>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        for dest_receivers in receivers.iter_mut() {
            for source_senders in senders.iter_mut() {
                let (sender, receiver) = channel();
                source_senders.push(sender);
                dest_receivers.push(receiver);
            }
        }
        Ok(senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadCommunicator {
                rank,
                senders,
                receivers,
                serialize_messages,
            })
            .collect())
    }

    /// run `task` on every participant, each in its own thread, and return the results ordered by rank;
    /// when participants fail, the root cause is preferred over the disconnections it triggered at the peers
    pub fn run<R, F>(size: usize, task: F) -> RankResult<Vec<R>>
    where
        R: Send,
        F: Fn(ThreadCommunicator) -> RankResult<R> + Sync,
    {
        Self::run_with(Self::communicators(size)?, task)
    }

    /// like [`LocalGroup::run`], with every message going through [`encode_message`]
    pub fn run_serialized<R, F>(size: usize, task: F) -> RankResult<Vec<R>>
    where
        R: Send,
        F: Fn(ThreadCommunicator) -> RankResult<R> + Sync,
    {
        Self::run_with(Self::serialized_communicators(size)?, task)
    }

    fn run_with<R, F>(communicators: Vec<ThreadCommunicator>, task: F) -> RankResult<Vec<R>>
    where
        R: Send,
        F: Fn(ThreadCommunicator) -> RankResult<R> + Sync,
    {
        let size = communicators.len();
        tracing::debug!("starting a local group of {size} participants");
        let results: Vec<RankResult<R>> = std::thread::scope(|scope| {
            let task = &task;
            let handles: Vec<_> = communicators
                .into_iter()
                .map(|communicator| {
                    std::thread::Builder::new()
                        .name(format!("rank-{}", communicator.rank))
                        .spawn_scoped(scope, move || task(communicator))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle {
                    Ok(handle) => handle.join().unwrap_or(Err(RankError::ParticipantPanicked)),
                    Err(err) => Err(RankError::from(err)),
                })
                .collect()
        });
        let mut first_error = None;
        for result in results.iter() {
            if let Err(err) = result {
                if !matches!(err, RankError::PeerDisconnected { .. }) {
                    return Err(err.clone());
                }
                first_error.get_or_insert_with(|| err.clone());
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        results.into_iter().collect()
    }
}

#[cfg(feature = "mpi_communicator")]
pub use mpi_transport::*;

#[cfg(feature = "mpi_communicator")]
mod mpi_transport {
    use super::*;
    use crate::mpi::environment::Universe;
    use crate::mpi::topology::SimpleCommunicator;
    use crate::mpi::traits::{Communicator as _, Destination as _, Source as _};

    /// this process as a member of `MPI_COMM_WORLD`, started by `mpirun -n <P>`
    pub struct MpiCommunicator {
        world: SimpleCommunicator,
        /// finalizes MPI when dropped, so it must be dropped after `world`
        _universe: Universe,
    }

    impl MpiCommunicator {
        /// MPI can only be initialized once per process
        pub fn initialize() -> RankResult<Self> {
            let universe = crate::mpi::initialize().ok_or(RankError::Transport("MPI is already initialized".to_string()))?;
            let world = universe.world();
            tracing::debug!("MPI process {} of {}", world.rank(), world.size());
            Ok(Self {
                world,
                _universe: universe,
            })
        }
    }

    impl Communicator for MpiCommunicator {
        fn rank(&self) -> ProcessRank {
            self.world.rank() as ProcessRank
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn send<T: Message>(&self, value: T, dest: ProcessRank) -> RankResult<()> {
            self.check_peer(dest)?;
            let bytes = encode_message(&value)?;
            self.world.process_at_rank(dest as crate::mpi::Rank).send(&bytes[..]);
            Ok(())
        }

        fn receive<T: Message>(&self, source: ProcessRank) -> RankResult<T> {
            self.check_peer(source)?;
            let (bytes, _status) = self.world.process_at_rank(source as crate::mpi::Rank).receive_vec::<u8>();
            decode_message(&bytes, source)
        }
    }
}
