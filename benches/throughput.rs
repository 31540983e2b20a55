use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use soonlist_feed::{
    cache::{CacheConfig, OfflineFeedCache},
    core::paginated::{PageEmission, PaginationStatus, StablePaginatedQuery},
    event::{Event, Visibility},
    persist::memory::MemoryKvStore,
    time::clock::ManualClock,
    types::FeedId,
};

fn event(i: u64) -> Event {
    Event {
        id: format!("evt_{i}"),
        user_id: "42".to_string(),
        name: format!("Event {i}"),
        start_ms: 1_700_000_000_000 + i * 60_000,
        end_ms: 1_700_000_000_000 + i * 60_000 + 3_600_000,
        location: Some("Brooklyn, NY".to_string()),
        image_url: Some(format!("https://upcdn.io/soonlist/{i}.jpg")),
        description: Some("d".repeat(512)),
        visibility: Visibility::Public,
    }
}

fn bench_cache_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_save");
    let cache = OfflineFeedCache::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(ManualClock::new(0)),
        CacheConfig::default(),
    );
    let feed = FeedId::user("42");

    for n in [50u64, 500, 5_000] {
        let items: Vec<Event> = (0..n).map(event).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &items, |b, items| {
            b.iter(|| cache.save(&feed, items.clone(), 0));
        });
    }

    group.finish();
}

fn bench_cache_trim(c: &mut Criterion) {
    let cache = OfflineFeedCache::new(
        Arc::new(MemoryKvStore::new()),
        Arc::new(ManualClock::new(0)),
        CacheConfig {
            max_bytes: 64 * 1024,
            ..CacheConfig::default()
        },
    );
    let feed = FeedId::user("42");
    let items: Vec<Event> = (0..2_000).map(event).collect();

    c.bench_function("cache_save_trim_2k_to_64k", |b| {
        b.iter(|| cache.save(&feed, items.clone(), 0));
    });
}

fn bench_stabilize(c: &mut Criterion) {
    c.bench_function("paginated_stabilize_10k", |b| {
        b.iter(|| {
            let mut query = StablePaginatedQuery::new(50);
            for i in 0..10_000u64 {
                let emission = if i % 2 == 0 {
                    PageEmission::loading(PaginationStatus::LoadingMore)
                } else {
                    PageEmission::settled(vec![i; 8], PaginationStatus::CanLoadMore)
                };
                let _ = query.observe(emission);
            }
        });
    });
}

criterion_group!(benches, bench_cache_save, bench_cache_trim, bench_stabilize);
criterion_main!(benches);
