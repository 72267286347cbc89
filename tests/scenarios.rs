//! End-to-end scenarios S1-S6, each run against both engines.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tsv::{EngineKind, Tsv};

const ENGINES: [EngineKind; 2] = [EngineKind::SlotPair, EngineKind::SubscriptionSlots];

fn s1_quiescent_read(kind: EngineKind) {
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        let tsv = Tsv::with_destructor_and_engine(
            move |_v: i32| {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            kind,
        );

        assert!(tsv.get().is_none());

        let v = tsv.set(42).unwrap();
        assert_eq!(v, 1);

        let g = tsv.get().unwrap();
        assert_eq!(*g, 42);
        assert_eq!(g.version(), 1);
        drop(g);

        tsv.release();
        tsv.destroy();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn s2_two_readers_one_writer(kind: EngineKind) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    {
        let calls_cl = calls.clone();
        let tsv = Arc::new(Tsv::with_destructor_and_engine(
            move |v: i32| {
                calls_cl.lock().unwrap_or_else(|e| e.into_inner()).push(v);
            },
            kind,
        ));

        let r1 = {
            let tsv = tsv.clone();
            thread::spawn(move || {
                tsv.wait();
                let g = tsv.get().unwrap();
                assert_eq!(*g, 1);
                assert_eq!(g.version(), 1);
                drop(g);

                loop {
                    let g = tsv.get().unwrap();
                    if g.version() == 2 {
                        assert_eq!(*g, 2);
                        break;
                    }
                    drop(g);
                    thread::yield_now();
                }
                tsv.release();
            })
        };

        let v1 = tsv.set(1).unwrap();
        assert_eq!(v1, 1);
        let v2 = tsv.set(2).unwrap();
        assert_eq!(v2, 2);

        r1.join().unwrap();
    }
    let calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    assert_eq!(calls.iter().filter(|&&v| v == 1).count(), 1);
    assert_eq!(calls.iter().filter(|&&v| v == 2).count(), 1);
}

fn s3_race_soak(kind: EngineKind) {
    let _ = env_logger::try_init();
    let readers_n = 8usize;
    let writers_n = 2usize;
    let ops = 200usize;
    let tsv = Arc::new(Tsv::<usize>::with_engine(kind));
    tsv.set(0).unwrap();

    let mut readers = Vec::with_capacity(readers_n);
    for t in 0..readers_n {
        let tsv = tsv.clone();
        readers.push(thread::spawn(move || {
            let mut last_version = 0u64;
            for i in 0..ops {
                let g = tsv.get().unwrap();
                let v = g.version();
                assert!(
                    v >= last_version,
                    "reader {t} observed version {v} after {last_version}"
                );
                last_version = v;
                drop(g);
                if i % 11 == 0 {
                    thread::sleep(Duration::from_micros((i % 3) as u64));
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    let mut writers = Vec::with_capacity(writers_n);
    for w in 0..writers_n {
        let tsv = tsv.clone();
        writers.push(thread::spawn(move || {
            for i in 0..ops {
                tsv.set(w * ops + i + 1).unwrap();
                if i % 13 == 0 {
                    thread::sleep(Duration::from_micros((i % 5) as u64));
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for w in writers {
        w.join().unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
}

fn s4_first_value_waiter_herd(kind: EngineKind) {
    let n = 20usize;
    let tsv = Arc::new(Tsv::<i32>::with_engine(kind));

    let mut readers = Vec::with_capacity(n);
    for _ in 0..n {
        let tsv = tsv.clone();
        readers.push(thread::spawn(move || {
            tsv.wait();
            let g = tsv.get().unwrap();
            assert_eq!(*g, 42);
            g.version()
        }));
    }

    thread::sleep(Duration::from_millis(20));
    let v = tsv.set(42).unwrap();
    assert_eq!(v, 1);

    for r in readers {
        assert_eq!(r.join().unwrap(), 1);
    }
}

fn s5_destroy_with_outstanding_references(kind: EngineKind) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_cl = calls.clone();
    let tsv = Arc::new(Tsv::with_destructor_and_engine(
        move |_v: i32| {
            calls_cl.fetch_add(1, Ordering::SeqCst);
        },
        kind,
    ));
    tsv.set(1).unwrap();

    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    let reader = {
        let tsv = tsv.clone();
        thread::spawn(move || {
            let g = tsv.get().unwrap();
            assert_eq!(*g, 1);
            ready_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(30));
            drop(g);
        })
    };

    ready_rx.recv().unwrap();
    tsv.release();
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "destructed while a reader still holds a reference"
    );

    reader.join().unwrap();
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "destructed before the TSV's own reference was released"
    );

    drop(tsv);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn s6_rapid_overwrite(kind: EngineKind) {
    let n = 10_000u64;
    let calls = Arc::new(AtomicU64::new(0));
    {
        let calls_cl = calls.clone();
        let tsv = Tsv::with_destructor_and_engine(
            move |_v: u64| {
                calls_cl.fetch_add(1, Ordering::SeqCst);
            },
            kind,
        );

        let mut last_version = 0;
        for i in 1..=n {
            last_version = tsv.set(i).unwrap();
        }
        assert_eq!(last_version, n);
        tsv.destroy();
    }
    assert_eq!(calls.load(Ordering::SeqCst), n);
}

macro_rules! scenario_tests {
    ($name:ident, $f:expr) => {
        mod $name {
            use super::*;
            #[test]
            fn slot_pair() {
                $f(EngineKind::SlotPair);
            }
            #[test]
            fn subscription_slots() {
                $f(EngineKind::SubscriptionSlots);
            }
        }
    };
}

scenario_tests!(s1, s1_quiescent_read);
scenario_tests!(s2, s2_two_readers_one_writer);
scenario_tests!(s4, s4_first_value_waiter_herd);
scenario_tests!(s5, s5_destroy_with_outstanding_references);
scenario_tests!(s6, s6_rapid_overwrite);

#[test]
fn s3_slot_pair() {
    s3_race_soak(EngineKind::SlotPair);
}

#[test]
fn s3_subscription_slots() {
    s3_race_soak(EngineKind::SubscriptionSlots);
}

#[test]
fn all_engines_are_exercised() {
    // Guards against silently dropping an engine from the matrix above.
    assert_eq!(ENGINES.len(), 2);
}
