//! Criterion benchmarks for rust_log_pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_log_pipeline::core::template::Template;
use rust_log_pipeline::core::CallSiteCache;
use rust_log_pipeline::prelude::*;
use std::sync::Arc;

/// Sink that only counts bytes, keeping I/O out of the measurement
struct NullSink;

impl Sink for NullSink {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        Ok(black_box(buf).len())
    }

    fn name(&self) -> &str {
        "null"
    }
}

fn null_logger(format: &str) -> Logger {
    Logger::builder()
        .handler(Handler::new(format).levels(["info", "error"]).sink(NullSink))
        .build()
}

// ============================================================================
// Log Path Benchmarks
// ============================================================================

fn bench_log_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_path");
    group.throughput(Throughput::Elements(1));

    let logger = null_logger("$level [$time][$file:$line][$func] $message");

    group.bench_function("routed_default_format", |b| {
        b.iter(|| {
            logger.info(format_args!("request {} done", black_box(42)));
        });
    });

    group.bench_function("unrouted_level", |b| {
        b.iter(|| {
            logger.debug(format_args!("request {} done", black_box(42)));
        });
    });

    let session = Session::new().with("request_id", "abc-123").with("user", 7);
    let with_session = null_logger("$request_id $user $message");
    group.bench_function("with_session", |b| {
        b.iter(|| {
            with_session
                .session(&session)
                .info(format_args!("request {} done", black_box(42)));
        });
    });

    group.finish();
}

// ============================================================================
// Component Benchmarks
// ============================================================================

fn bench_call_site_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_site_cache");
    let cache = CallSiteCache::new();

    group.bench_function("cached_resolve", |b| {
        b.iter(|| black_box(cache.resolve(0)));
    });

    group.finish();
}

fn bench_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");

    let global = Context::new().with_field("hostname", "web-1").with_field("ip", "10.0.0.1");
    let dynamic = Context::new()
        .with_field("level", "info")
        .with_field("message", "request done");
    let template = Template::parse("$hostname/$ip $level: $message");

    group.bench_function("parse", |b| {
        b.iter(|| Template::parse(black_box("$hostname/$ip $level: $message")));
    });

    group.bench_function("render", |b| {
        b.iter(|| black_box(template.render(&[&global, &dynamic])));
    });

    group.finish();
}

fn bench_reconfigure(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconfigure");
    let logger = null_logger("$message");
    let handlers: Vec<Arc<Handler>> = (0..8)
        .map(|_| {
            Arc::new(
                Handler::new("$message")
                    .levels(["debug", "info", "warn", "error", "fatal"])
                    .sink(NullSink),
            )
        })
        .collect();

    group.bench_function("swap_8_handlers", |b| {
        b.iter(|| logger.reconfigure(handlers.iter().cloned()));
    });

    group.finish();
}

fn bench_concurrent_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_logging");
    let logger = Arc::new(null_logger("$level $message"));

    group.bench_function("multi_thread_4", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let logger = Arc::clone(&logger);
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            logger.info(format_args!("Concurrent message"));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_log_path,
    bench_call_site_cache,
    bench_template,
    bench_reconfigure,
    bench_concurrent_logging
);

criterion_main!(benches);
