use std::collections::BTreeSet;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::measurement::WallTime;
use sspp::environments::frozen_lake::{frozen_lake, FrozenLake};
use sspp::model_checking::reachability::reach;
use sspp::model_checking::unfold::UnfoldedMDP;
use sspp::{guaranteed_short_path, Pruning, UnfoldConfig};

enum Lake {
    SMALL,
    BIG
}

fn setup(lake: Lake) -> (FrozenLake, BTreeSet<usize>) {
    let lake = match lake {
        Lake::SMALL => frozen_lake(false),
        Lake::BIG => frozen_lake(true)
    };
    let goal: BTreeSet<usize> = vec![lake.goal].into_iter().collect();
    (lake, goal)
}

pub fn unfolding_benchmark(c: &mut Criterion) -> &mut Criterion<WallTime> {
    let (lake, goal) = setup(Lake::BIG);
    let length: f64 = -30.0;
    let threshold = UnfoldConfig { pruning: Pruning::Threshold, ..UnfoldConfig::default() };
    let shortest = UnfoldConfig::default();

    c.bench_function("unfold 8x8 threshold pruning", |b|
        b.iter(|| UnfoldedMDP::new(&lake.mdp, &lake.start, &goal, black_box(length), &threshold)));
    c.bench_function("unfold 8x8 shortest path pruning", |b|
        b.iter(|| UnfoldedMDP::new(&lake.mdp, &lake.start, &goal, black_box(length), &shortest)))
}

pub fn reachability_benchmark(c: &mut Criterion) -> &mut Criterion<WallTime> {
    let (lake, goal) = setup(Lake::SMALL);
    let length: f64 = -15.0;
    let unfolded = match UnfoldedMDP::new(&lake.mdp, &lake.start, &goal, length, &UnfoldConfig::default()) {
        Ok(u) => u,
        Err(e) => panic!("There was an error unfolding the lake: {}", e)
    };

    c.bench_function("reachability LP 4x4 unfolded", |b|
        b.iter(|| reach(&unfolded.mdp, &unfolded.targets)));
    c.bench_function("guaranteed short path 4x4", |b|
        b.iter(|| guaranteed_short_path(&lake.mdp, &lake.start, &goal, black_box(length), 0.5,
                                        &UnfoldConfig::default())))
}

criterion_group!(benches, unfolding_benchmark, reachability_benchmark);
criterion_main!(benches);
