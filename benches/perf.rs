use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use match_forecast::fake_history::{HistoryPlan, generate_history};
use match_forecast::store::{ConnectionManager, init_schema, upsert_matches};
use match_forecast::{ForecastService, ModelConfig, StoreConfig};

fn seeded_service(dir: &tempfile::TempDir) -> ForecastService {
    let cfg = StoreConfig {
        db_path: dir.path().join("bench.sqlite"),
        min_acquire_interval: Duration::ZERO,
        ..StoreConfig::default()
    };
    let manager = Arc::new(ConnectionManager::open(&cfg));
    init_schema(&manager).expect("schema");
    upsert_matches(&manager, &generate_history(&HistoryPlan::default())).expect("seed");
    ForecastService::new(manager, &ModelConfig::default())
}

fn bench_predict(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = seeded_service(&dir);
    service.fit();
    let snapshot = service.model().snapshot();
    let teams = snapshot.team_strengths.keys().cloned().collect::<Vec<_>>();
    let league = snapshot.league_effects.keys().next().cloned();

    c.bench_function("predict_known_teams", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let home = &teams[idx % teams.len()];
            let away = &teams[(idx + 1) % teams.len()];
            idx += 1;
            let p = service.predict(black_box(home), black_box(away), league.as_deref());
            black_box(p.confidence);
        })
    });

    c.bench_function("predict_unknown_teams", |b| {
        b.iter(|| {
            let p = service.predict(black_box("Nowhere FC"), black_box("Elsewhere"), None);
            black_box(p.home_prob);
        })
    });
}

fn bench_fit(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = seeded_service(&dir);

    let mut group = c.benchmark_group("fit");
    group.sample_size(20);
    group.bench_function("fit_seeded_history", |b| {
        b.iter(|| {
            let report = service.fit();
            black_box(report.is_trained());
        })
    });
    group.finish();
}

criterion_group!(perf, bench_predict, bench_fit);
criterion_main!(perf);
