// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_cascade` resolution.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

use understory_attribute::{Attribute, AttributeMetadata, AttributeRegistry};
use understory_cascade::{
    AnimatedStyleSheet, AnimatedVariable, ManualScheduler, Segment, StateExpression,
    StateGroupTypeExpression, StateId, StateSet, StatefulStyle, StyleQuery, StyleSheet,
    TypeHierarchy, TypeRegistry,
};

fn registry() -> (Arc<AttributeRegistry>, Attribute<f64>) {
    let mut registry = AttributeRegistry::new();
    let width = registry.register("Width", AttributeMetadata::new(0.0_f64));
    (Arc::new(registry), width)
}

fn bench_stateful(c: &mut Criterion) {
    let (registry, width) = registry();
    let mut group = c.benchmark_group("cascade/stateful");

    // One declaration per state, each more specific than the last.
    let style = StatefulStyle::new(registry.clone());
    style.set(width, None, 0.0).unwrap();
    let mut expr = StateExpression::state(StateId(0));
    for i in 1..8_u32 {
        style.set(width, Some(expr.clone()), f64::from(i)).unwrap();
        expr = expr.and(StateExpression::state(StateId(i)));
    }

    for active in [0_u32, 4, 8] {
        let states = StateSet::from_ids((0..active).map(StateId));
        group.bench_function(BenchmarkId::new("resolve_local", active), |b| {
            b.iter(|| black_box(style.resolve_in(width, black_box(&states))));
        });
    }

    for depth in [1_usize, 4, 16] {
        let chain: Vec<StatefulStyle> = (0..depth)
            .map(|_| StatefulStyle::new(registry.clone()))
            .collect();
        chain[depth - 1].set(width, None, 1.0).unwrap();
        for pair in chain.windows(2) {
            pair[0].add_dependency(&pair[1]).unwrap();
        }
        group.bench_function(BenchmarkId::new("resolve_dependency_chain", depth), |b| {
            b.iter(|| black_box(chain[0].get(width)));
        });
    }

    group.bench_function("set_state_toggle", |b| {
        let on = StateSet::from_ids([StateId(0)]);
        let off = StateSet::empty();
        let mut flag = false;
        b.iter(|| {
            flag = !flag;
            black_box(style.set_state(if flag { on.clone() } else { off.clone() }))
        });
    });

    group.finish();
}

fn bench_sheet(c: &mut Criterion) {
    let (registry, width) = registry();
    let mut types = TypeRegistry::new();
    let mut parent = types.register("Root", None);
    for i in 0..6 {
        parent = types.register(&format!("T{i}"), Some(parent));
    }
    let leaf_ty = types.element_type(parent);

    let sheet = StyleSheet::new(registry);
    let mut ancestor = Some(parent);
    while let Some(tag) = ancestor {
        let expr = StateGroupTypeExpression::new().with_type(types.element_type(tag));
        sheet.set(width, Some(expr), f64::from(tag.0)).unwrap();
        ancestor = types.parent(tag);
    }
    let hovered = StateGroupTypeExpression::new()
        .with_type(types.element_type(parent))
        .with_states(StateExpression::state(StateId(0)));
    sheet.set(width, Some(hovered), -1.0).unwrap();

    let mut group = c.benchmark_group("cascade/sheet");
    let idle = StateSet::empty();
    let hovering = StateSet::from_ids([StateId(0)]);
    group.bench_function("resolve_type_hierarchy", |b| {
        let query = StyleQuery::new(&leaf_ty, &idle);
        b.iter(|| black_box(sheet.get(width, black_box(&query))));
    });
    group.bench_function("resolve_state_and_type", |b| {
        let query = StyleQuery::new(&leaf_ty, &hovering);
        b.iter(|| black_box(sheet.get(width, black_box(&query))));
    });
    group.finish();
}

fn bench_animated(c: &mut Criterion) {
    let (registry, width) = registry();
    let sheet = AnimatedStyleSheet::new(registry, Arc::new(ManualScheduler::new()));
    let segments = vec![
        Segment::new(100.0, 0.0, Duration::from_millis(500)),
        Segment::new(0.0, 5.0, Duration::from_millis(500)),
    ];
    sheet
        .add_variable(AnimatedVariable::new("x", 0.0, segments, true).unwrap())
        .unwrap();
    sheet.set(width, None, "clamp(x * 2 + 1, 0, 150)").unwrap();

    let mut group = c.benchmark_group("cascade/animated");
    group.bench_function("value_at", |b| {
        b.iter(|| black_box(sheet.value_at(width, None)));
    });
    group.bench_function("set_animation_time", |b| {
        let mut t = 0_u64;
        b.iter(|| {
            t += 7;
            black_box(sheet.set_animation_time(Duration::from_millis(t)))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_stateful, bench_sheet, bench_animated);
criterion_main!(benches);
