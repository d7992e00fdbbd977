//! The collective transport contract.
//!
//! The step protocol needs exactly three communication primitives plus a
//! plain barrier, all with barrier semantics: every rank of the group must
//! reach the call before any rank proceeds. Payloads cross the boundary as
//! bincode bytes, so nothing pointer-shaped can travel between ranks.

use bincode::config;
use bincode::de::Decode;
use bincode::Encode;

use crate::errors::SimulationError;

/// A synchronous communicator over a fixed group of ranks.
///
/// Implementations must provide reliable, ordered delivery and blocking
/// rendezvous semantics: a collective call returns only once every rank of
/// the group has made the matching call. A rank that never arrives stalls
/// the whole group, which implementations surface as
/// [`SimulationError::CollectiveTimeout`] rather than hanging forever.
pub trait Collective {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Blocks until every rank has arrived.
    fn barrier(&self) -> Result<(), SimulationError>;

    /// Delivers `value` from `origin` to every rank. The origin passes
    /// `Some(value)`, everyone else `None`; all ranks receive the decoded
    /// value.
    fn broadcast<T>(&self, value: Option<T>, origin: usize) -> Result<T, SimulationError>
    where
        T: Encode + Decode<()>;

    /// Collects one value per rank at `coordinator`, which receives them in
    /// rank order; every other rank receives `None`.
    fn gather<T>(&self, value: &T, coordinator: usize) -> Result<Option<Vec<T>>, SimulationError>
    where
        T: Encode + Decode<()>;

    /// Collects one value per rank at every rank, in rank order.
    fn all_gather<T>(&self, value: &T) -> Result<Vec<T>, SimulationError>
    where
        T: Encode + Decode<()>;
}

pub(crate) fn encode_payload<T: Encode>(value: &T) -> Result<Vec<u8>, SimulationError> {
    bincode::encode_to_vec(value, config::standard())
        .map_err(|e| SimulationError::ProtocolViolation(format!("payload encoding failed: {}", e)))
}

pub(crate) fn decode_payload<T: Decode<()>>(bytes: &[u8]) -> Result<T, SimulationError> {
    let (value, _) = bincode::decode_from_slice(bytes, config::standard())
        .map_err(|e| SimulationError::ProtocolViolation(format!("payload decoding failed: {}", e)))?;
    Ok(value)
}
