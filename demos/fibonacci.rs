//! Three threads ask for the same Fibonacci number at once. Only one of them
//! computes it, the others wait and receive the same result.
//!
//! Run with `RUST_LOG=flightcache=debug cargo run --example fibonacci`.

use std::thread;
use std::time::{Duration, Instant};

use flightcache::Executor;

fn fibonacci(n: u64) -> u64 {
    if n <= 1 { n } else { fibonacci(n - 1) + fibonacci(n - 2) }
}

/// The same computation through the attribute.
#[flightcache::single_flight]
fn slow_fibonacci(n: u64) -> u64 {
    thread::sleep(Duration::from_secs(1));
    fibonacci(n)
}

fn main() {
    tracing_subscriber::fmt::init();

    let executor = Executor::<u64, u64>::new();
    thread::scope(|s| {
        for index in [40, 40, 40] {
            let executor = &executor;
            s.spawn(move || {
                let started = Instant::now();
                match executor.evaluate(index, |&n| Ok(fibonacci(n))) {
                    Ok(value) => println!(
                        "Calculated Fibo({index}) = {value}. It took {:?}",
                        started.elapsed()
                    ),
                    Err(err) => println!("Fibo({index}) failed: {err}"),
                }
            });
        }
    });

    let started = Instant::now();
    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| slow_fibonacci(30));
        }
    });
    println!(
        "Three concurrent calls to slow_fibonacci(30) = {} took {:?}",
        slow_fibonacci(30),
        started.elapsed()
    );
}
