//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify round-trip, overwrite, delete, expiry and
//! key-mapping properties against a real temporary directory.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::cache::{validate_key, FileCache, PathMapper, Ttl, RESERVED_CHARACTERS};
use crate::clock::ManualClock;
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_DEFAULT_TTL: i64 = 300;

fn test_cache() -> (TempDir, ManualClock, FileCache) {
    let tmp = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let config = CacheConfig::new(tmp.path()).with_default_ttl(TEST_DEFAULT_TTL);
    let cache = FileCache::with_clock(config, Arc::new(clock.clone())).unwrap();
    (tmp, clock, cache)
}

// == Strategies ==
/// Generates valid cache keys (non-empty, no reserved characters)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.\\-]{1,64}"
}

/// Values of every shape a caller might store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Sample {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<i32>),
}

fn value_strategy() -> impl Strategy<Value = Sample> {
    prop_oneof![
        any::<bool>().prop_map(Sample::Bool),
        any::<i64>().prop_map(Sample::Int),
        ".{0,64}".prop_map(Sample::Text),
        prop::collection::vec(any::<i32>(), 0..16).prop_map(Sample::List),
    ]
}

/// Model of what the cache should hold for a key
#[derive(Debug, Clone)]
enum Stored {
    Value(Sample),
    Counter(i64),
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Sample },
    Delete { key: String },
    Increment { key: String, step: i32 },
}

fn small_key_strategy() -> impl Strategy<Value = String> {
    "k[0-4]"
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (small_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        small_key_strategy().prop_map(|key| CacheOp::Delete { key }),
        (small_key_strategy(), -100i32..100)
            .prop_map(|(key, step)| CacheOp::Increment { key, step }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // *For any* valid key and value, storing then retrieving before
    // expiration returns exactly the stored value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let (_tmp, _clock, cache) = test_cache();

        prop_assert!(cache.set(&key, &value, Ttl::Default).unwrap());
        let retrieved: Option<Sample> = cache.get(&key).unwrap();
        prop_assert_eq!(retrieved, Some(value), "Round-trip value mismatch");
    }

    // *For any* key, after a delete a subsequent get returns nothing.
    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in value_strategy()) {
        let (_tmp, _clock, cache) = test_cache();

        cache.set(&key, &value, Ttl::Default).unwrap();
        prop_assert!(cache.has(&key).unwrap(), "Key should exist before delete");

        prop_assert!(cache.delete(&key).unwrap());
        prop_assert!(!cache.has(&key).unwrap(), "Key should not exist after delete");
        prop_assert!(cache.delete(&key).unwrap(), "Deleting an absent key succeeds");
    }

    // *For any* TTL, the entry is visible strictly before expiry and
    // invisible from the expiry second onward.
    #[test]
    fn prop_ttl_boundary(key in valid_key_strategy(), ttl in -5i64..120, elapsed in 0i64..150) {
        let (_tmp, clock, cache) = test_cache();

        cache.set(&key, "value", Ttl::Seconds(ttl)).unwrap();
        clock.advance(elapsed);

        let visible = cache.has(&key).unwrap();
        // Allow one second of wall-clock drift between set and get
        if elapsed + 1 < ttl {
            prop_assert!(visible, "entry should live: ttl={} elapsed={}", ttl, elapsed);
        }
        if elapsed >= ttl {
            prop_assert!(!visible, "entry should be gone: ttl={} elapsed={}", ttl, elapsed);
        }
    }

    // *For any* sequence of operations, the cache agrees with a HashMap model.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let (_tmp, _clock, cache) = test_cache();
        let mut model: HashMap<String, Stored> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    prop_assert!(cache.set(&key, &value, Ttl::Default).unwrap());
                    model.insert(key, Stored::Value(value));
                }
                CacheOp::Delete { key } => {
                    prop_assert!(cache.delete(&key).unwrap());
                    model.remove(&key);
                }
                CacheOp::Increment { key, step } => {
                    // Anything that is not a plain integer counts as zero
                    let current = match model.get(&key) {
                        Some(Stored::Counter(n)) => *n,
                        _ => 0,
                    };
                    let expected = current + i64::from(step);
                    let result = cache.increment(&key, i64::from(step)).unwrap();
                    prop_assert_eq!(result, Some(expected));
                    model.insert(key, Stored::Counter(expected));
                }
            }
        }

        for i in 0..5 {
            let key = format!("k{i}");
            match model.get(&key) {
                Some(Stored::Value(value)) => {
                    let stored: Option<Sample> = cache.get(&key).unwrap();
                    prop_assert_eq!(stored.as_ref(), Some(value), "mismatch for {}", key);
                }
                Some(Stored::Counter(n)) => {
                    let stored: Option<i64> = cache.get(&key).unwrap();
                    prop_assert_eq!(stored, Some(*n), "counter mismatch for {}", key);
                }
                None => prop_assert!(!cache.has(&key).unwrap(), "{} should be absent", key),
            }
        }
    }

    // *For any* key, the mapped path is a two-level shard below the root
    // whose components spell out the 64-character digest.
    #[test]
    fn prop_path_layout(key in valid_key_strategy()) {
        let mapper = PathMapper::new("/cache", "");
        let path = mapper.path_for(&key);
        let digest = mapper.digest(&key);

        let relative = path.file.strip_prefix("/cache").unwrap();
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert_eq!(parts.concat(), digest);
        prop_assert_eq!(parts[0].len(), 1);
        prop_assert_eq!(parts[1].len(), 1);
    }

    // *For any* string containing a reserved character, validation fails.
    #[test]
    fn prop_reserved_characters_rejected(
        prefix in "[a-z]{0,8}",
        suffix in "[a-z]{0,8}",
        idx in 0..RESERVED_CHARACTERS.len()
    ) {
        let key = format!("{prefix}{}{suffix}", RESERVED_CHARACTERS[idx]);
        prop_assert!(validate_key(&key).is_err());
    }
}
