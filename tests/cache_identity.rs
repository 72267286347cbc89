//! Regression test for the per-thread cache keying: a dropped `Tsv`'s
//! allocation may be reused by a later, same-`T` `Tsv`, but the calling
//! thread's cache entry must never be reinterpreted as belonging to it.
use tsv::{EngineKind, Tsv};

fn sequential_same_type_instances_dont_alias(kind: EngineKind) {
    // `get()` without an intervening `release()` is what the old
    // address-keyed cache got wrong: a dropped `Tsv`'s cache entry could
    // survive (address reused by the allocator, same cached version number)
    // and be handed back as if it belonged to the new `Tsv`.
    {
        let x = Tsv::<i32>::with_engine(kind);
        x.set(111).unwrap();
        let g = x.get().unwrap();
        assert_eq!(*g, 111);
        assert_eq!(g.version(), 1);
        drop(g);
        drop(x);
    }

    let y = Tsv::<i32>::with_engine(kind);
    // A fresh TSV has never been set; if this thread's cache entry for `x`
    // were mistakenly reused for `y` (same address, same version number 1),
    // this would wrongly return `Some(111)` instead of `None`.
    assert!(y.get().is_none());

    y.set(222).unwrap();
    let g = y.get().unwrap();
    assert_eq!(*g, 222);
    assert_eq!(g.version(), 1);
}

#[test]
fn sequential_same_type_instances_dont_alias_slot_pair() {
    sequential_same_type_instances_dont_alias(EngineKind::SlotPair);
}

#[test]
fn sequential_same_type_instances_dont_alias_subscription_slots() {
    sequential_same_type_instances_dont_alias(EngineKind::SubscriptionSlots);
}

#[test]
fn many_sequential_instances_get_distinct_ids() {
    // Heap allocators routinely hand the same address back to the next
    // same-size allocation; creating and dropping many `Tsv`s in a loop on
    // one thread is the scenario most likely to trigger that reuse.
    for i in 0..64 {
        let tsv = Tsv::<i32>::new();
        assert!(tsv.get().is_none(), "iteration {i}: unexpected stale value");
        tsv.set(i).unwrap();
        assert_eq!(*tsv.get().unwrap(), i);
    }
}
