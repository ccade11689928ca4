//! Fan-out benchmarks for Ripple.
//!
//! Measures resolve-then-deliver cost as the participant set grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ripple_bench::fanout_fixture;
use ripple_core::broadcast;
use ripple_protocol::{ChatMessage, ServerEvent};

/// Benchmark delivery to every participant of one chat.
fn bench_to_participants(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_participants");

    for &n in &[10usize, 100, 1000] {
        let mut fixture = fanout_fixture(n);
        let event = ServerEvent::NewMessage(ChatMessage::new("bench", "user-0", "u0", "hello"));

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let delivered = broadcast::to_participants(
                    &fixture.directory,
                    &fixture.presence,
                    black_box(&fixture.chat_id),
                    black_box(&event),
                    Some("user-0"),
                );
                // Drain so the unbounded queues stay flat
                for rx in &mut fixture.receivers {
                    while rx.try_recv().is_ok() {}
                }
                delivered
            })
        });
    }

    group.finish();
}

/// Benchmark the broadcast-to-everyone path used for presence updates.
fn bench_to_everyone(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_everyone");

    for &n in &[10usize, 100, 1000] {
        let mut fixture = fanout_fixture(n);
        let event = ServerEvent::UsersOnline {
            users: (0..n).map(|i| format!("user-{i}")).collect(),
        };

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let delivered = broadcast::to_everyone(&fixture.presence, black_box(&event));
                for rx in &mut fixture.receivers {
                    while rx.try_recv().is_ok() {}
                }
                delivered
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_to_participants, bench_to_everyone);
criterion_main!(benches);
