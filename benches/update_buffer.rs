//! Update buffer benchmarks.
//!
//! Compares the chunked and anchored buffers on the edit pattern a code
//! generator produces: many small insertions spread over a file, a few
//! removals, then one `generate`.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench update_buffer
//! # Only one buffer kind:
//! cargo bench --bench update_buffer -- anchored
//! ```

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use arbor::update::BufferKind;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `lines` lines of Rust-looking source.
fn source(lines: usize) -> Arc<[u8]> {
    let mut out = String::new();
    for i in 0..lines {
        out.push_str(&format!("    let value_{i} = compute({i});\n"));
    }
    Arc::from(out.into_bytes())
}

/// Offsets of every line start.
fn line_starts(content: &[u8]) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            content
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1)
                .filter(|&i| i < content.len()),
        )
        .collect()
}

const KINDS: [BufferKind; 2] = [BufferKind::Chunked, BufferKind::Anchored];

// ---------------------------------------------------------------------------
// Benchmark: scattered insertions
// ---------------------------------------------------------------------------

/// One insertion on each side of every line start.
fn bench_insertions(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for lines in [100, 1_000] {
        let content = source(lines);
        let starts = line_starts(&content);
        group.throughput(Throughput::Elements(starts.len() as u64 * 2));

        for kind in KINDS {
            group.bench_with_input(BenchmarkId::new(kind.to_string(), lines), &starts, |b, starts| {
                b.iter(|| {
                    let mut buffer = kind.create(Arc::clone(&content));
                    for &offset in starts {
                        buffer.insert_left(offset, b"// ", false).expect("offset in range");
                        buffer.insert_right(offset, b"#[rustfmt::skip] ", false).expect("offset in range");
                    }
                    black_box(buffer.generate())
                });
            });
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: insert then remove
// ---------------------------------------------------------------------------

/// Insert at every fourth line, then remove every other line wholesale.
fn bench_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");

    for lines in [100, 1_000] {
        let content = source(lines);
        let starts = line_starts(&content);

        for kind in KINDS {
            group.bench_with_input(BenchmarkId::new(kind.to_string(), lines), &starts, |b, starts| {
                b.iter(|| {
                    let mut buffer = kind.create(Arc::clone(&content));
                    for &offset in starts.iter().step_by(4) {
                        buffer.insert_right(offset, b"/* moved */", false).expect("offset in range");
                    }
                    for pair in starts.windows(2).step_by(2) {
                        buffer.remove(pair[0] + 1, pair[1] - pair[0] - 1).expect("offset in range");
                    }
                    black_box(buffer.generate())
                });
            });
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_insertions, bench_mixed);
criterion_main!(benches);
