mod collective;
mod local_communicator;
mod partition_coordinator;

pub use collective::*;
pub use local_communicator::*;
pub use partition_coordinator::*;

#[cfg(test)]
mod collective_tests;
