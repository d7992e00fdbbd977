use std::thread;
use std::time::Duration;

use crate::distributed::{Collective, LocalCommunicator};
use crate::errors::SimulationError;

#[test]
fn test_empty_group_is_rejected() {
    assert_eq!(
        LocalCommunicator::group(0).err(),
        Some(SimulationError::EmptyCluster)
    );
}

#[test]
fn test_single_rank_group_talks_to_itself() {
    let comms = LocalCommunicator::group(1).expect("group");
    let comm = &comms[0];
    comm.barrier().expect("barrier");
    assert_eq!(comm.broadcast(Some(42_u64), 0).expect("broadcast"), 42);
    assert_eq!(comm.gather(&7_u64, 0).expect("gather"), Some(vec![7]));
    assert_eq!(comm.all_gather(&7_u64).expect("all_gather"), vec![7]);
}

#[test]
fn test_broadcast_delivers_the_origin_value_everywhere() {
    let comms = LocalCommunicator::group(3).expect("group");
    thread::scope(|scope| {
        for comm in comms {
            scope.spawn(move || {
                let value = if comm.rank() == 1 {
                    Some(vec![3_u32, 1, 4, 1, 5])
                } else {
                    None
                };
                let received = comm.broadcast(value, 1).expect("broadcast");
                assert_eq!(received, vec![3, 1, 4, 1, 5]);
            });
        }
    });
}

#[test]
fn test_gather_collects_in_rank_order_at_the_coordinator_only() {
    let comms = LocalCommunicator::group(4).expect("group");
    thread::scope(|scope| {
        for comm in comms {
            scope.spawn(move || {
                let payload = comm.rank() as u64 * 10;
                let result = comm.gather(&payload, 2).expect("gather");
                if comm.rank() == 2 {
                    assert_eq!(result, Some(vec![0, 10, 20, 30]));
                } else {
                    assert_eq!(result, None);
                }
            });
        }
    });
}

#[test]
fn test_all_gather_collects_everywhere() {
    let comms = LocalCommunicator::group(3).expect("group");
    thread::scope(|scope| {
        for comm in comms {
            scope.spawn(move || {
                let payload = comm.rank() as i32 - 1;
                let result = comm.all_gather(&payload).expect("all_gather");
                assert_eq!(result, vec![-1, 0, 1]);
            });
        }
    });
}

#[test]
fn test_rounds_reset_between_consecutive_collectives() {
    let comms = LocalCommunicator::group(2).expect("group");
    thread::scope(|scope| {
        for comm in comms {
            scope.spawn(move || {
                for round in 0..5_u64 {
                    let all = comm
                        .all_gather(&(round * 2 + comm.rank() as u64))
                        .expect("all_gather");
                    assert_eq!(all, vec![round * 2, round * 2 + 1]);
                }
                comm.barrier().expect("barrier");
            });
        }
    });
}

#[test]
fn test_a_missing_rank_times_out_instead_of_hanging() {
    let mut comms =
        LocalCommunicator::group_with_deadline(2, Duration::from_millis(50)).expect("group");
    let comm = comms.remove(0);
    // Rank 1 never reaches the rendezvous.
    match comm.barrier() {
        Err(SimulationError::CollectiveTimeout { waited_ms }) => assert!(waited_ms >= 50),
        other => panic!("expected a collective timeout, got {:?}", other),
    }
}
