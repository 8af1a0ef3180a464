//! Run with `cargo test --all-features`.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;
use std::time::Duration;

use flightcache::testing::{last_origin, last_was_hit, Origin};
use flightcache::{single_flight, Executor};
use quickcheck_macros::quickcheck;

macro_rules! test {
    (computed: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert_eq!(last_origin(), Some(Origin::Computed));
    }};
    (cached: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert_eq!(last_origin(), Some(Origin::Cached));
    }};
    (hit: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(last_was_hit());
    }};
    (miss: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(!last_was_hit());
    }};
}

/// Test basic memoization through the attribute.
#[test]
fn test_basic() {
    #[single_flight]
    fn empty() -> String {
        format!("The world is {}", "big")
    }

    #[single_flight]
    fn double(x: u32) -> u32 {
        2 * x
    }

    #[single_flight]
    fn sum(a: u32, b: u32) -> u32 {
        a + b
    }

    #[single_flight]
    fn fib(n: u32) -> u32 {
        if n <= 2 { 1 } else { fib(n - 1) + fib(n - 2) }
    }

    test!(computed: empty(), "The world is big");
    test!(cached: empty(), "The world is big");
    test!(cached: empty(), "The world is big");

    test!(computed: double(2), 4);
    test!(computed: double(4), 8);
    test!(cached: double(2), 4);

    test!(computed: sum(2, 4), 6);
    test!(computed: sum(2, 3), 5);
    test!(cached: sum(2, 3), 5);
    test!(computed: sum(4, 2), 6);

    test!(computed: fib(5), 5);
    test!(cached: fib(3), 2);
    test!(computed: fib(8), 21);
    test!(cached: fib(7), 13);
}

/// Test that concurrent calls through the attribute share one execution.
#[test]
fn test_coalescing() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    #[single_flight]
    fn slow_square(n: u64) -> u64 {
        CALLS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        n * n
    }

    let barrier = Barrier::new(4);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    (slow_square(12), last_origin())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|(value, _)| *value == 144));

    let origins: Vec<_> = results.iter().map(|(_, origin)| origin.unwrap()).collect();
    assert_eq!(origins.iter().filter(|&&o| o == Origin::Computed).count(), 1);

    test!(cached: slow_square(12), 144);
}

/// Test that a returned `Result` is cached, errors included.
#[test]
fn test_cached_errors() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    #[single_flight]
    fn parse(text: String) -> Result<i32, String> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        text.trim().parse().map_err(|_| format!("not a number: {text}"))
    }

    test!(computed: parse("42".into()), Ok(42));
    test!(computed: parse("x".into()), Err("not a number: x".to_string()));
    test!(cached: parse("x".into()), Err("not a number: x".to_string()));
    test!(cached: parse("42".into()), Ok(42));
    assert_eq!(CALLS.load(Ordering::SeqCst), 2);
}

/// Test that functions without a return value run only once.
#[test]
fn test_unit() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    #[single_flight]
    fn init() {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    init();
    init();
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(last_origin(), Some(Origin::Cached));
}

/// Test that an early `return` in the body works.
#[test]
fn test_early_return() {
    #[single_flight]
    fn clamp(n: i64) -> i64 {
        if n < 0 {
            return 0;
        }
        n.min(100)
    }

    test!(computed: clamp(-5), 0);
    test!(computed: clamp(500), 100);
    test!(cached: clamp(-5), 0);
}

/// Test that only cached outcomes count as hits.
#[test]
fn test_hits() {
    #[single_flight]
    fn triple(n: u8) -> u16 {
        u16::from(n) * 3
    }

    test!(miss: triple(3), 9);
    test!(hit: triple(3), 9);
    test!(miss: triple(4), 12);
    test!(hit: triple(4), 12);
}

/// Test the origins seen by waiting and late callers of an executor.
#[test]
fn test_origins() {
    let executor = Executor::<&str, usize>::new();
    let barrier = Barrier::new(2);
    thread::scope(|s| {
        let computer = s.spawn(|| {
            let outcome = executor.evaluate("key", |key| {
                barrier.wait();
                thread::sleep(Duration::from_millis(100));
                Ok(key.len())
            });
            (outcome, last_origin())
        });

        barrier.wait();
        assert_eq!(executor.evaluate("key", |_| Ok(0)), Ok(3));
        assert_eq!(last_origin(), Some(Origin::Coalesced));
        assert_eq!(computer.join().unwrap(), (Ok(3), Some(Origin::Computed)));
    });

    test!(cached: executor.evaluate("key", |_| Ok(0)), Ok(3));
}

/// Every key is computed exactly once, however the calls interleave.
#[quickcheck]
fn prop_each_key_computed_once(keys: Vec<u8>) -> bool {
    let executor = Executor::<u8, u16>::new();
    let calls = Mutex::new(HashMap::<u8, usize>::new());
    let compute = |&key: &u8| -> Result<u16, Infallible> {
        *calls.lock().unwrap().entry(key).or_default() += 1;
        Ok(u16::from(key) * 2)
    };

    let correct = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let keys = &keys;
                let executor = &executor;
                let compute = &compute;
                s.spawn(move || {
                    keys.iter()
                        .cycle()
                        .skip(i)
                        .take(keys.len())
                        .all(|&key| executor.evaluate(key, compute) == Ok(u16::from(key) * 2))
                })
            })
            .collect();
        handles.into_iter().all(|h| h.join().unwrap())
    });

    let distinct: HashSet<u8> = keys.iter().copied().collect();
    let calls = calls.into_inner().unwrap();
    correct
        && executor.len() == distinct.len()
        && calls.len() == distinct.len()
        && calls.values().all(|&count| count == 1)
}
