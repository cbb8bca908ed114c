use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion as Bench};

use bandgrade_core::consistency::{validate_scores, ConsistencyConfig};
use bandgrade_core::model::Criterion;
use bandgrade_core::scoring::{apply_length_penalty, compute_overall, round_to_half};

fn writing_scores() -> BTreeMap<Criterion, f64> {
    let mut m = BTreeMap::new();
    m.insert(Criterion::TaskResponse, 3.0);
    m.insert(Criterion::Coherence, 6.0);
    m.insert(Criterion::Lexical, 8.5);
    m.insert(Criterion::Grammar, 2.0);
    m
}

fn writing_notes() -> BTreeMap<Criterion, String> {
    let mut m = BTreeMap::new();
    m.insert(
        Criterion::TaskResponse,
        "Excellent coverage of all parts of the task with sophisticated ideas.".into(),
    );
    m.insert(
        Criterion::Coherence,
        "Generally clear progression with effective paragraphing.".into(),
    );
    m.insert(
        Criterion::Lexical,
        "Serious and severe errors; limited, repetitive and basic vocabulary.".into(),
    );
    m.insert(Criterion::Grammar, "Good control of simple structures.".into());
    m
}

fn bench_normalization(c: &mut Bench) {
    let mut group = c.benchmark_group("normalization");

    group.bench_function("round_to_half", |b| {
        b.iter(|| round_to_half(black_box(6.37)))
    });

    group.bench_function("compute_overall", |b| {
        b.iter(|| {
            compute_overall(
                black_box(6.5),
                black_box(6.0),
                black_box(7.0),
                black_box(5.5),
            )
        })
    });

    let essay = vec!["word"; 230].join(" ");
    group.bench_function("length_penalty_230_words", |b| {
        b.iter(|| apply_length_penalty(black_box(7.0), black_box(&essay), black_box(250)))
    });

    group.finish();
}

fn bench_consistency(c: &mut Bench) {
    let mut group = c.benchmark_group("consistency");
    let scores = writing_scores();
    let notes = writing_notes();
    let config = ConsistencyConfig::default();

    group.bench_function("validate_scores_mixed_feedback", |b| {
        b.iter(|| {
            validate_scores(
                black_box(&scores),
                black_box(&notes),
                black_box("An impressive response overall."),
                black_box(&config),
            )
        })
    });

    let empty_notes = BTreeMap::new();
    group.bench_function("validate_scores_no_feedback", |b| {
        b.iter(|| {
            validate_scores(
                black_box(&scores),
                black_box(&empty_notes),
                black_box(""),
                black_box(&config),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_normalization, bench_consistency);
criterion_main!(benches);
