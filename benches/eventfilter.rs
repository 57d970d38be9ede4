//! Throughput benchmark for the kernel-log matching path (spec.md §4.2,
//! §9 "Regex pre-compilation"): how many lines per second `EventFilter`
//! can match against a realistic multi-rule set.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nodewatch::domain::models::{EventRuleConfig, Level};
use nodewatch::eventfilter::EventFilter;

fn sample_rules() -> HashMap<String, EventRuleConfig> {
    let mut rules = HashMap::new();
    rules.insert(
        "SysOOM".to_string(),
        EventRuleConfig {
            name: "SysOOM".to_string(),
            description: "system out of memory".to_string(),
            regexp: r"Out of memory: Kill(ed)? process".to_string(),
            level: Level::Critical,
            suggestion: String::new(),
            log_file: None,
        },
    );
    rules.insert(
        "NVSXID".to_string(),
        EventRuleConfig {
            name: "NVSXID".to_string(),
            description: "NVIDIA Xid error".to_string(),
            regexp: r"NVRM: Xid.*: \d+".to_string(),
            level: Level::Critical,
            suggestion: String::new(),
            log_file: None,
        },
    );
    rules.insert(
        "NCCLSegFault".to_string(),
        EventRuleConfig {
            name: "NCCLSegFault".to_string(),
            description: "NCCL segfault".to_string(),
            regexp: r"segfault.*\[nccl".to_string(),
            level: Level::Warning,
            suggestion: String::new(),
            log_file: None,
        },
    );
    rules
}

fn bench_match_line(c: &mut Criterion) {
    let filter = EventFilter::new(sample_rules());

    let matching = "6,100,0,-;Out of memory: Kill process 1234 (worker)";
    let non_matching = "6,101,0,-;kernel: eth0: link up, 10Gbps full duplex";

    let mut group = c.benchmark_group("event_filter_match_line");
    group.bench_function("matching_line", |b| {
        b.iter(|| filter.match_line(black_box(matching)));
    });
    group.bench_function("non_matching_line", |b| {
        b.iter(|| filter.match_line(black_box(non_matching)));
    });
    group.finish();

    filter.drain();
}

fn bench_drain(c: &mut Criterion) {
    c.bench_function("event_filter_drain_after_burst", |b| {
        b.iter_batched(
            || {
                let filter = EventFilter::new(sample_rules());
                for i in 0..100 {
                    filter.match_line(&format!("6,{i},0,-;Out of memory: Kill process {i}"));
                }
                filter
            },
            |filter| black_box(filter.drain()),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_match_line, bench_drain);
criterion_main!(benches);
