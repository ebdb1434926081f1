use criterion::{Criterion, criterion_group, criterion_main};
use roadmap_coherence::similarity::similarity;
use roadmap_coherence::validator::validate;
use roadmap_core::config::CoherenceConfig;
use roadmap_core::item::{Item, ItemType, Roadmap};
use std::hint::black_box;

const AREAS: [&str; 8] = [
    "invoice export",
    "password reset",
    "search indexing",
    "audit logging",
    "team invitations",
    "usage reporting",
    "webhook delivery",
    "session timeout",
];

/// Build a roadmap with `epics` epics of six stories, each with three tasks.
fn build_roadmap(epics: usize) -> Roadmap {
    let mut roadmap = Roadmap::new("bench", "Benchmark platform");
    let mut milestone = Item::new("1", "General availability", ItemType::Milestone);

    for e in 1..=epics {
        let area = AREAS[e % AREAS.len()];
        let mut epic = Item::new(format!("1.{e}"), format!("{area} {e}"), ItemType::Epic);
        for s in 1..=6 {
            let story_id = format!("1.{e}.{s}");
            let mut story = Item::new(
                story_id.clone(),
                format!("{area} variant {s} for epic {e}"),
                ItemType::Story,
            )
            .with_description(format!("Deliver {area} for customer segment {s}"));
            for t in 1..=3 {
                story.add_child(
                    Item::new(
                        format!("{story_id}.{t}"),
                        format!("Step {t} of {area}"),
                        ItemType::Task,
                    )
                    .with_description(format!("Wire {area} step {t}")),
                );
            }
            epic.add_child(story);
        }
        milestone.add_child(epic);
    }

    roadmap.root.add_child(milestone);
    roadmap
}

fn bench_similarity(c: &mut Criterion) {
    c.bench_function("similarity_short_names", |b| {
        b.iter(|| {
            similarity(
                black_box("User login system"),
                black_box("User logout system"),
            )
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let config = CoherenceConfig::default();
    let mut group = c.benchmark_group("validate");

    for epics in [4, 16] {
        let roadmap = build_roadmap(epics);
        let items = roadmap.all_items().len();
        group.bench_function(format!("{items}_items"), |b| {
            b.iter(|| validate(black_box(&roadmap), &config));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_similarity, bench_validate);
criterion_main!(benches);
