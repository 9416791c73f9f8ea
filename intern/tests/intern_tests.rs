//! End-to-end tests for the intern store.
//!
//! These exercise the public API the way a telemetry index would: many
//! short strings, repeated interning, reference-count churn, and periodic
//! resets.

use intern_store::{Compression, InternConfig, InternError, InternStore, SlotAddr};

/// Representative payload mix: short names through one oversized outlier.
const TEST_OBJECTS: &[&str] = &[
    "SmallString",
    "LongerString",
    "AnEvenLongerString",
    "metric",
    "root",
    "server",
    "servername1234",
    "servername4321",
    "servername91FFXX",
    "AndTheLongestStringWeDealWithWithEvenASmallAmountOfSpaceMoreToGetUsOverTheGiganticLimitOfStuff",
];

fn store_with(compression: Compression) -> InternStore {
    InternStore::new(InternConfig {
        compression,
        ..InternConfig::default()
    })
    .expect("failed to create store")
}

/// Deterministic pseudo-random ASCII string, keyed by (seed, len).
fn scrambled_key(seed: u64, len: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            LETTERS[(state % LETTERS.len() as u64) as usize] as char
        })
        .collect()
}

fn intern_all(store: &InternStore, objects: &[&str]) -> Vec<SlotAddr> {
    objects
        .iter()
        .map(|s| store.add_or_get(s.as_bytes()).expect("add_or_get failed"))
        .collect()
}

#[test]
fn basic_intern_distinct_addresses() {
    for compression in [Compression::None, Compression::Shoco] {
        let store = store_with(compression);
        let addrs = intern_all(&store, TEST_OBJECTS);

        // Distinct payloads get distinct addresses.
        for (i, a) in addrs.iter().enumerate() {
            for b in &addrs[i + 1..] {
                assert_ne!(a, b);
            }
        }

        // Repeated interning returns the same address and bumps the count.
        for expected in [2u32, 3] {
            for (obj, addr) in TEST_OBJECTS.iter().zip(&addrs) {
                let again = store.add_or_get(obj.as_bytes()).unwrap();
                assert_eq!(again, *addr);
                assert_eq!(store.ref_count(*addr).unwrap(), expected);
            }
        }
    }
}

#[test]
fn refcount_reaches_ten_then_deletes() {
    let store = store_with(Compression::Shoco);
    let addrs = intern_all(&store, TEST_OBJECTS);

    for _ in 0..9 {
        intern_all(&store, TEST_OBJECTS);
    }
    for addr in &addrs {
        assert_eq!(store.ref_count(*addr).unwrap(), 10);
    }

    // Nine deletes keep every object live.
    for _ in 0..9 {
        for addr in &addrs {
            assert_eq!(store.delete(*addr), Ok(false));
        }
    }
    for addr in &addrs {
        assert_eq!(store.ref_count(*addr).unwrap(), 1);
    }

    // The tenth removes it; an eleventh sees nothing.
    for addr in &addrs {
        assert_eq!(store.delete(*addr), Ok(true));
        assert_eq!(store.delete(*addr), Err(InternError::NotFound));
    }
    assert!(store.is_empty());
}

#[test]
fn inc_ref_count_paths_agree() {
    let store = store_with(Compression::Shoco);
    let addrs = intern_all(&store, TEST_OBJECTS);

    for _ in 0..3 {
        for addr in &addrs {
            store.inc_ref_count(*addr).unwrap();
        }
    }
    for obj in TEST_OBJECTS {
        store.inc_ref_count_by_str(obj).unwrap();
    }
    for _ in 0..2 {
        store.inc_ref_count_batch(&addrs);
    }

    for addr in &addrs {
        assert_eq!(store.ref_count(*addr).unwrap(), 7);
    }
}

#[test]
fn delete_by_value_both_codecs() {
    for compression in [Compression::None, Compression::Shoco] {
        for key_len in [25usize, 250] {
            let store = store_with(compression);
            let keys: Vec<String> = (0..501).map(|i| scrambled_key(i, key_len)).collect();

            for key in &keys {
                store.add_or_get(key.as_bytes()).unwrap();
            }
            for key in &keys {
                store.add_or_get(key.as_bytes()).unwrap();
            }

            // First delete drops to one reference, second removes.
            for key in &keys {
                assert_eq!(store.delete_by_bytes(key.as_bytes()), Ok(false));
            }
            for key in &keys {
                assert_eq!(store.delete_by_str(key), Ok(true));
            }
            assert!(store.is_empty());
            assert_eq!(store.mem_stats_total(), 0);
        }
    }
}

#[test]
fn batch_delete_spares_survivors() {
    for compression in [Compression::None, Compression::Shoco] {
        let store = store_with(compression);
        let keys: Vec<String> = (0..501).map(|i| scrambled_key(1000 + i, 30)).collect();
        let addrs: Vec<SlotAddr> = keys
            .iter()
            .map(|k| store.add_or_get(k.as_bytes()).unwrap())
            .collect();

        // Raise every count to 10.
        for _ in 0..9 {
            for key in &keys {
                store.add_or_get(key.as_bytes()).unwrap();
            }
        }

        // Ten batch rounds over all but the last five.
        let doomed = &addrs[..addrs.len() - 5];
        for _ in 0..10 {
            store.delete_batch(doomed);
        }

        let survivors = &addrs[addrs.len() - 5..];
        for addr in survivors {
            assert!(store.obj_str(*addr).is_ok());
        }
        assert_eq!(store.len(), survivors.len());

        for _ in 0..10 {
            store.delete_batch(survivors);
        }
        for addr in &addrs {
            assert_eq!(store.obj_string(*addr), Err(InternError::NotFound));
        }
        assert!(store.is_empty());
    }
}

#[test]
fn join_strings_identity() {
    for compression in [Compression::None, Compression::Shoco] {
        let store = store_with(compression);
        let addrs = intern_all(&store, TEST_OBJECTS);

        let expected = TEST_OBJECTS.join(".");
        assert_eq!(store.join_strings(&addrs, ".").unwrap(), expected);

        assert_eq!(store.join_strings(&[], "."), Err(InternError::Empty));
        assert_eq!(
            store.join_strings(&addrs[..1], ".").unwrap(),
            TEST_OBJECTS[0]
        );
    }
}

#[test]
fn object_round_trips() {
    for compression in [Compression::None, Compression::Shoco] {
        let store = store_with(compression);
        let addrs = intern_all(&store, TEST_OBJECTS);

        for (obj, addr) in TEST_OBJECTS.iter().zip(&addrs) {
            assert_eq!(store.obj_bytes(*addr).unwrap().as_ref(), obj.as_bytes());
            assert_eq!(store.obj_string(*addr).unwrap(), *obj);
            assert_eq!(store.obj_str(*addr).unwrap(), *obj);
        }
    }
}

#[test]
fn compression_transparency() {
    let store = store_with(Compression::Shoco);
    let addr = store.add_or_get(b"HowTheWindBlowsThroughTheTrees").unwrap();

    // Reads decompress back to the original.
    assert_eq!(
        store.obj_string(addr).unwrap(),
        "HowTheWindBlowsThroughTheTrees"
    );

    // The stored canonical form is the compressed bytes, and reads never
    // alias them.
    let stored = store.compress(b"HowTheWindBlowsThroughTheTrees");
    assert!(stored.len() < "HowTheWindBlowsThroughTheTrees".len());
    let (lens, complete) = store.payload_lens(&[addr]);
    assert!(complete);
    assert_eq!(lens, vec![stored.len()]);

    let s = store.obj_str(addr).unwrap();
    assert_ne!(s.as_ptr() as usize, addr.as_usize() + 4);
}

#[test]
fn zero_copy_key_aliasing() {
    let store = store_with(Compression::None);
    let first = store.add_or_get_str(b"SmallString").unwrap();
    let second = store.add_or_get_str(b"SmallString").unwrap();
    assert_eq!(first.as_ptr(), second.as_ptr());
    assert_eq!(first, second);
}

#[test]
fn compress_decompress_fixtures() {
    let store = store_with(Compression::Shoco);
    for obj in TEST_OBJECTS {
        let compressed = store.compress(obj.as_bytes());
        let back = store.decompress(&compressed).unwrap();
        assert_eq!(back.as_ref(), obj.as_bytes());

        let compressed = store.compress_str(obj);
        assert_eq!(store.decompress_str(&compressed).unwrap(), *obj);
    }
}

#[test]
fn mem_stats_cover_every_pool() {
    let store = store_with(Compression::None);
    let addrs = intern_all(&store, TEST_OBJECTS);

    let stats = store.mem_stats_per_pool();
    assert!(!stats.is_empty());
    for stat in &stats {
        assert!(stat.mem_used > 0);
    }
    let total: usize = stats.iter().map(|s| s.mem_used).sum();
    assert_eq!(total, store.mem_stats_total());

    // Deleting everything returns all mapped memory.
    for addr in &addrs {
        store.delete(*addr).unwrap();
    }
    assert_eq!(store.mem_stats_total(), 0);
    assert_eq!(store.frag_stats_total(), 0.0);
}

#[test]
fn reset_clears_ten_thousand_objects() {
    let store = store_with(Compression::Shoco);

    let mut addrs = Vec::with_capacity(10_000);
    for i in 0..10_000 {
        let key = format!("{}{}", TEST_OBJECTS[i % TEST_OBJECTS.len()], i);
        addrs.push(store.add_or_get(key.as_bytes()).unwrap());
    }
    assert_eq!(store.len(), 10_000);

    store.reset();
    assert_eq!(store.len(), 0);
    assert_eq!(store.mem_stats_total(), 0);
    for addr in addrs.iter().step_by(97) {
        assert_eq!(store.obj_bytes(*addr), Err(InternError::NotFound));
    }
}

#[test]
fn concurrent_churn_leaves_store_empty() {
    let store = store_with(Compression::None);
    let threads = 8;
    let iterations = 500;

    std::thread::scope(|scope| {
        for t in 0..threads {
            let store = &store;
            scope.spawn(move || {
                for i in 0..iterations {
                    // Every thread hammers one shared key plus a private one.
                    let shared = store.add_or_get(b"shared.metric.name").unwrap();
                    let own = store
                        .add_or_get(format!("thread.{}.key.{}", t, i % 16).as_bytes())
                        .unwrap();
                    store.delete(own).unwrap();
                    store.delete(shared).unwrap();
                }
            });
        }
    });

    assert!(store.is_empty());
    assert_eq!(store.mem_stats_total(), 0);
}

#[test]
fn concurrent_refcount_is_conserved() {
    let store = store_with(Compression::Shoco);
    let addr = store.add_or_get(b"pinned").unwrap();
    let threads = 6u32;
    let per_thread = 400u32;

    std::thread::scope(|scope| {
        for _ in 0..threads {
            let store = &store;
            scope.spawn(move || {
                for _ in 0..per_thread {
                    store.inc_ref_count(addr).unwrap();
                }
            });
        }
    });

    assert_eq!(
        store.ref_count(addr).unwrap(),
        1 + threads * per_thread
    );
}
