//! Control-queue throughput and latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin spsc_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0        Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2        Pin consumer to CPU 2 (default: 2)
//!     ITERATIONS=1048576    Messages per run (default: 2^20)
//!     RUST_LOG=lfmq=debug   Log filter (with `--features tracing`)

use std::env;
use std::hint;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lfmq::message::command::{PlayAt, Volume};
use lfmq::sync::spsc::{Producer, channel};
use lfmq::{Command, Message};
use minstant::Instant;

const QUEUE_SIZE: usize = 1024;

struct BenchConfig {
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
    iterations: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            producer_cpu: Some(0),
            consumer_cpu: Some(2),
            iterations: 1 << 20,
        }
    }
}

impl BenchConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            producer_cpu: env_or("PRODUCER_CPU").or(defaults.producer_cpu),
            consumer_cpu: env_or("CONSUMER_CPU").or(defaults.consumer_cpu),
            iterations: env_or("ITERATIONS").unwrap_or(defaults.iterations),
        }
    }
}

fn env_or<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

/// Pushes `msg`, spinning while the queue is full.
fn push_spin(producer: &Producer<Message, QUEUE_SIZE>, mut msg: Message) {
    while let Err(back) = producer.push(msg) {
        msg = back;
        hint::spin_loop();
    }
}

fn bench_throughput(config: &BenchConfig) {
    let (producer, mut consumer) = channel::<Message, QUEUE_SIZE>();
    let iterations = config.iterations;
    let consumer_cpu = config.consumer_cpu;

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    let consumer_thread = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);
        ready_clone.store(true, Ordering::Release);

        let mut msg = Message::default();
        for expected in 0..iterations {
            while !consumer.pop_into(&mut msg) {
                hint::spin_loop();
            }
            match Command::try_from(&msg) {
                Ok(Command::PlayAt(PlayAt { frame })) if frame == expected => {}
                other => panic!("Data corruption: expected frame {expected}, got {other:?}"),
            }
        }
    });

    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(config.producer_cpu);

    let start = Instant::now();

    for frame in 0..iterations {
        push_spin(&producer, Message::from(Command::PlayAt(PlayAt { frame })));
    }

    consumer_thread.join().expect("consumer thread panicked");
    let elapsed = start.elapsed();

    let ops_per_ms = u128::from(iterations) * 1_000_000 / elapsed.as_nanos().max(1);
    println!("{ops_per_ms} msgs/ms");
}

fn bench_rtt(config: &BenchConfig) {
    let (q1_producer, mut q1_consumer) = channel::<Message, QUEUE_SIZE>();
    let (q2_producer, mut q2_consumer) = channel::<Message, QUEUE_SIZE>();
    let iterations = config.iterations;
    let consumer_cpu = config.consumer_cpu;

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Echoes every envelope back unchanged.
    let responder = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);
        ready_clone.store(true, Ordering::Release);

        let mut msg = Message::default();
        for _ in 0..iterations {
            while !q1_consumer.pop_into(&mut msg) {
                hint::spin_loop();
            }
            push_spin(&q2_producer, msg);
        }
    });

    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(config.producer_cpu);

    let ping = Message::from(Command::Volume(Volume { gain: 0.5 }));
    let start = Instant::now();

    for _ in 0..iterations {
        push_spin(&q1_producer, ping);
        while !q2_consumer.skip() {
            hint::spin_loop();
        }
    }

    let elapsed = start.elapsed();
    responder.join().expect("responder thread panicked");

    let rtt_ns = elapsed.as_nanos() / u128::from(iterations.max(1));
    println!("{rtt_ns} ns RTT");
}

fn main() {
    lfmq::init_tracing();

    let config = BenchConfig::from_env();

    println!(
        "lfmq SPSC (size={}, message={} bytes, iters={}):",
        QUEUE_SIZE,
        size_of::<Message>(),
        config.iterations
    );
    bench_throughput(&config);
    bench_rtt(&config);
}
