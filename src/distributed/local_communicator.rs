//! In-process realization of the collective contract.
//!
//! P ranks live in one OS process as threads, each holding one
//! [`LocalCommunicator`] endpoint of a shared group. A collective call is a
//! generation-counted rendezvous over a byte inbox: every rank deposits its
//! encoded payload, the last arrival opens the exchange, every rank copies
//! what it needs, and the last departure resets the round. Payloads travel
//! as bincode bytes even though ranks share an address space, so the wire
//! discipline is the same one a network-backed communicator would impose.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bincode::de::Decode;
use bincode::Encode;
use log::debug;

use crate::distributed::{decode_payload, encode_payload, Collective};
use crate::errors::SimulationError;

/// Upper bound on how long a rank waits at a rendezvous before the stalled
/// step is reported as [`SimulationError::CollectiveTimeout`].
pub const DEFAULT_STEP_DEADLINE: Duration = Duration::from_secs(30);

pub struct LocalCommunicator {
    rank: usize,
    deadline: Duration,
    shared: Arc<Shared>,
}

struct Shared {
    size: usize,
    state: Mutex<Round>,
    rendezvous: Condvar,
}

struct Round {
    inbox: Vec<Option<Vec<u8>>>,
    arrived: usize,
    departed: usize,
    /// True between "everyone arrived" and "everyone departed"; a new round
    /// cannot start while the previous one is draining.
    exchanging: bool,
}

impl LocalCommunicator {
    /// Creates the endpoints of a group of `size` ranks, in rank order.
    pub fn group(size: usize) -> Result<Vec<LocalCommunicator>, SimulationError> {
        Self::group_with_deadline(size, DEFAULT_STEP_DEADLINE)
    }

    pub fn group_with_deadline(
        size: usize,
        deadline: Duration,
    ) -> Result<Vec<LocalCommunicator>, SimulationError> {
        if size == 0 {
            return Err(SimulationError::EmptyCluster);
        }
        let shared = Arc::new(Shared {
            size,
            state: Mutex::new(Round {
                inbox: vec![None; size],
                arrived: 0,
                departed: 0,
                exchanging: false,
            }),
            rendezvous: Condvar::new(),
        });
        debug!("created local communicator group of {} ranks", size);
        Ok((0..size)
            .map(|rank| LocalCommunicator { rank, deadline, shared: Arc::clone(&shared) })
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Round>, SimulationError> {
        self.shared
            .state
            .lock()
            .map_err(|_| SimulationError::ProtocolViolation("communicator state poisoned".to_string()))
    }

    fn wait<'a>(
        &self,
        round: MutexGuard<'a, Round>,
        start: Instant,
    ) -> Result<MutexGuard<'a, Round>, SimulationError> {
        let elapsed = start.elapsed();
        let remaining = self.deadline.checked_sub(elapsed).ok_or(
            SimulationError::CollectiveTimeout { waited_ms: elapsed.as_millis() as u64 },
        )?;
        let (round, _) = self
            .shared
            .rendezvous
            .wait_timeout(round, remaining)
            .map_err(|_| SimulationError::ProtocolViolation("communicator state poisoned".to_string()))?;
        Ok(round)
    }

    /// The rendezvous every collective is built on: deposit this rank's
    /// bytes, block until all ranks have deposited, return a copy of every
    /// rank's bytes in rank order.
    fn exchange(&self, bytes: Vec<u8>) -> Result<Vec<Vec<u8>>, SimulationError> {
        let start = Instant::now();
        let mut round = self.lock()?;

        while round.exchanging {
            round = self.wait(round, start)?;
        }

        round.inbox[self.rank] = Some(bytes);
        round.arrived += 1;
        if round.arrived == self.shared.size {
            round.exchanging = true;
            self.shared.rendezvous.notify_all();
        }

        while !round.exchanging {
            round = self.wait(round, start)?;
        }

        let mut all = Vec::with_capacity(self.shared.size);
        for slot in &round.inbox {
            match slot {
                Some(bytes) => all.push(bytes.clone()),
                None => {
                    return Err(SimulationError::ProtocolViolation(
                        "torn collective round: a rank's payload is missing".to_string(),
                    ));
                }
            }
        }

        round.departed += 1;
        if round.departed == self.shared.size {
            for slot in round.inbox.iter_mut() {
                *slot = None;
            }
            round.arrived = 0;
            round.departed = 0;
            round.exchanging = false;
            self.shared.rendezvous.notify_all();
        }

        Ok(all)
    }
}

impl Collective for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), SimulationError> {
        self.exchange(Vec::new()).map(|_| ())
    }

    fn broadcast<T>(&self, value: Option<T>, origin: usize) -> Result<T, SimulationError>
    where
        T: Encode + Decode<()>,
    {
        if origin >= self.size() {
            return Err(SimulationError::ProtocolViolation(format!(
                "broadcast origin {} outside a group of {}",
                origin,
                self.size()
            )));
        }
        let bytes = if self.rank == origin {
            match value.as_ref() {
                Some(v) => encode_payload(v)?,
                None => {
                    return Err(SimulationError::ProtocolViolation(
                        "broadcast origin supplied no value".to_string(),
                    ));
                }
            }
        } else {
            Vec::new()
        };
        let all = self.exchange(bytes)?;
        decode_payload(&all[origin])
    }

    fn gather<T>(&self, value: &T, coordinator: usize) -> Result<Option<Vec<T>>, SimulationError>
    where
        T: Encode + Decode<()>,
    {
        if coordinator >= self.size() {
            return Err(SimulationError::ProtocolViolation(format!(
                "gather coordinator {} outside a group of {}",
                coordinator,
                self.size()
            )));
        }
        let all = self.exchange(encode_payload(value)?)?;
        if self.rank == coordinator {
            let decoded = all
                .iter()
                .map(|bytes| decode_payload(bytes))
                .collect::<Result<Vec<T>, SimulationError>>()?;
            Ok(Some(decoded))
        } else {
            Ok(None)
        }
    }

    fn all_gather<T>(&self, value: &T) -> Result<Vec<T>, SimulationError>
    where
        T: Encode + Decode<()>,
    {
        let all = self.exchange(encode_payload(value)?)?;
        all.iter().map(|bytes| decode_payload(bytes)).collect()
    }
}
