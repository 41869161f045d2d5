// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_predicate` condition-tree lookup.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use understory_predicate::{ConditionTree, PredicateRegistry, TypedPredicate};

fn bench_values_for(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_tree/values_for");

    for leaves in [8_u32, 64, 256] {
        let mut registry = PredicateRegistry::<u32>::new();
        let predicates: Vec<TypedPredicate<u32>> = (0..leaves)
            .map(|i| registry.filter(&format!("mod{i}"), move |v| v % (i + 1) == 0))
            .collect();

        let mut tree = ConditionTree::new();
        for (i, p) in predicates.iter().enumerate() {
            tree.add(p, [i]);
            // A second stage below every fourth leaf.
            if i % 4 == 0 {
                tree.add(&p.and(&predicates[0]), [i + 10_000]);
            }
        }

        group.bench_function(BenchmarkId::from_parameter(leaves), |b| {
            let mut x = 0_u32;
            b.iter(|| {
                x = x.wrapping_add(37);
                black_box(tree.values_for(black_box(&x)).len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_values_for);
criterion_main!(benches);
