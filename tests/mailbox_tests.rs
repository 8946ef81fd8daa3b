// SPDX-License-Identifier: GPL-3.0-only

//! Cross-thread behavior of the single-slot frame mailbox.

use std::thread;
use std::time::{Duration, Instant};

use rgbd_stream::mailbox::{mailbox, TryRecvError};

/// A frame whose payload makes torn delivery detectable: every element
/// carries the sequence number.
fn frame(sequence: u64) -> Vec<u64> {
    vec![sequence; 256]
}

#[test]
fn frames_are_never_torn_and_sequences_never_regress() {
    let (tx, rx) = mailbox::<Vec<u64>>();
    const FRAMES: u64 = 1000;

    let producer = thread::spawn(move || {
        for sequence in 1..=FRAMES {
            tx.send(frame(sequence));
        }
    });

    let mut last_seen = 0;
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        assert!(Instant::now() < deadline, "producer never finished");
        match rx.try_recv() {
            Ok(payload) => {
                let sequence = payload[0];
                assert!(
                    payload.iter().all(|&x| x == sequence),
                    "torn frame at sequence {sequence}"
                );
                assert!(
                    sequence > last_seen,
                    "sequence regressed: {sequence} after {last_seen}"
                );
                last_seen = sequence;
            }
            Err(TryRecvError::Empty) => thread::yield_now(),
            Err(TryRecvError::Disconnected) => break,
        }
    }
    producer.join().unwrap();
    // The last frame is never lost: it is either consumed before the
    // disconnect or delivered by the final drain.
    assert_eq!(last_seen, FRAMES);
}

#[test]
fn consumer_skips_to_latest_under_slow_polling() {
    let (tx, rx) = mailbox::<Vec<u64>>();
    for sequence in 1..=5 {
        tx.send(frame(sequence));
    }
    // Only the most recent of the five sends is observable.
    assert_eq!(rx.try_recv().unwrap()[0], 5);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn disconnect_after_unread_frame_still_delivers_it() {
    let (tx, rx) = mailbox::<Vec<u64>>();
    tx.send(frame(7));
    drop(tx);
    assert_eq!(rx.try_recv().unwrap()[0], 7);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
}
