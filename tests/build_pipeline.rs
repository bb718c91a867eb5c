//! End-to-end build pipeline tests with stub collaborators.

mod common;

use common::{PresetImageEmbedder, PresetMetadata, StubProvider, write_media};
use recollect::llm::ActivityAndFacts;
use recollect::models::{CaptureMethod, DayEvent};
use recollect::services::{BurstGrouper, MemoryBuilder};
use recollect::ingest::DirectorySource;
use recollect::storage::GraphStore;
use std::path::Path;
use std::sync::Arc;

/// A unit vector at roughly the given cosine similarity to (1, 0).
fn at_similarity(target: f32) -> Vec<f32> {
    vec![target, (1.0 - target * target).sqrt()]
}

fn builder(
    media_dir: &Path,
    data_dir: &Path,
    metadata: PresetMetadata,
    image_embedder: PresetImageEmbedder,
    provider: Arc<StubProvider>,
) -> MemoryBuilder {
    MemoryBuilder::new(
        Arc::new(DirectorySource::new(media_dir)),
        Arc::new(metadata),
        Arc::new(image_embedder),
        provider,
        GraphStore::new(data_dir),
        BurstGrouper::new(0.85, 0.95),
        7,
    )
}

#[test]
fn photo_burst_groups_under_first_shot() {
    let media = tempfile::tempdir().expect("media dir");
    let data = tempfile::tempdir().expect("data dir");
    write_media(media.path(), "a.jpg", b"shot one");
    write_media(media.path(), "b.jpg", b"shot two");

    let metadata = PresetMetadata::new()
        .with("a.jpg", "2024:06:14 15:30:00", CaptureMethod::Photo)
        .with("b.jpg", "2024:06:14 15:30:05", CaptureMethod::Photo);
    // Similarity 0.9 clears the 0.85 photo threshold.
    let embedder = PresetImageEmbedder::new()
        .with(b"shot one", vec![1.0, 0.0])
        .with(b"shot two", at_similarity(0.9));
    let provider = Arc::new(StubProvider::new());

    let report = builder(media.path(), data.path(), metadata, embedder, provider.clone())
        .build()
        .expect("build");

    assert_eq!(report.grouped, 1);
    let child = report.memory_graph.get("b.jpg").expect("child");
    assert!(child.has_parent);
    assert_eq!(
        child.parent_node_name.as_ref().map(|k| k.as_str()),
        Some("a.jpg")
    );
    // Only the root is enriched.
    assert_eq!(report.enriched, 1);
    assert_eq!(provider.call_count("generate_visual_content"), 1);
    assert!(report.memory_graph.get("b.jpg").expect("child").content.is_none());
}

#[test]
fn screenshots_at_photo_similarity_stay_separate() {
    let media = tempfile::tempdir().expect("media dir");
    let data = tempfile::tempdir().expect("data dir");
    write_media(media.path(), "a.png", b"screen one");
    write_media(media.path(), "b.png", b"screen two");

    let metadata = PresetMetadata::new()
        .with("a.png", "2024:06:14 15:30:00", CaptureMethod::Screenshot)
        .with("b.png", "2024:06:14 15:30:05", CaptureMethod::Screenshot);
    // Similarity 0.9 is below the 0.95 screenshot threshold.
    let embedder = PresetImageEmbedder::new()
        .with(b"screen one", vec![1.0, 0.0])
        .with(b"screen two", at_similarity(0.9));
    let provider = Arc::new(StubProvider::new());

    let report = builder(media.path(), data.path(), metadata, embedder, provider)
        .build()
        .expect("build");

    assert_eq!(report.grouped, 0);
    assert!(report.memory_graph.get("b.png").expect("node").is_root());
    assert_eq!(report.enriched, 2);
}

#[test]
fn captures_on_different_days_never_group() {
    let media = tempfile::tempdir().expect("media dir");
    let data = tempfile::tempdir().expect("data dir");
    write_media(media.path(), "a.jpg", b"same scene");
    write_media(media.path(), "b.jpg", b"same scene again");

    let metadata = PresetMetadata::new()
        .with("a.jpg", "2024:06:14 23:59:00", CaptureMethod::Photo)
        .with("b.jpg", "2024:06:15 00:01:00", CaptureMethod::Photo);
    // Identical embeddings, but two minutes apart across midnight.
    let embedder = PresetImageEmbedder::new()
        .with(b"same scene", vec![1.0, 0.0])
        .with(b"same scene again", vec![1.0, 0.0]);
    let provider = Arc::new(StubProvider::new());

    let report = builder(media.path(), data.path(), metadata, embedder, provider)
        .build()
        .expect("build");

    assert_eq!(report.grouped, 0);
}

#[test]
fn rebuild_from_processed_state_makes_no_provider_calls() {
    let media = tempfile::tempdir().expect("media dir");
    let data = tempfile::tempdir().expect("data dir");
    write_media(media.path(), "a.jpg", b"beach photo");

    let provider = Arc::new(StubProvider::new());
    provider.day_events.lock().expect("lock").insert(
        "2024-06-14".to_string(),
        vec![DayEvent {
            event_name: "Beach day".to_string(),
            date: "2024-06-14".to_string(),
            location: "Santa Cruz".to_string(),
            is_multi_days: false,
            importance: 2,
        }],
    );
    provider.activity_facts.lock().expect("lock").push((
        "beach photo".to_string(),
        ActivityAndFacts {
            activity: "A day at the beach".to_string(),
            knowledge: vec!["The owner lives near Santa Cruz".to_string()],
        },
    ));

    let make = || {
        builder(
            media.path(),
            data.path(),
            PresetMetadata::new().with("a.jpg", "2024:06:14 15:30:00", CaptureMethod::Photo),
            PresetImageEmbedder::new().with(b"beach photo", vec![1.0, 0.0]),
            provider.clone(),
        )
    };

    let first = make().build().expect("first build");
    assert!(first.phase_failure.is_none());
    assert!(first.cost > 0.0);
    assert_eq!(first.knowledge_graph.events.event_count(), 1);
    assert_eq!(first.knowledge_graph.knowledge.len(), 1);
    let calls = provider.total_calls();

    let second = make().build().expect("second build");
    assert_eq!(provider.total_calls(), calls, "rebuild must make zero provider calls");
    assert!(second.cost.abs() < f64::EPSILON);
    assert_eq!(second.knowledge_graph, first.knowledge_graph);
    assert_eq!(second.memory_graph.len(), first.memory_graph.len());
}

#[test]
fn repeated_fact_merges_instead_of_duplicating() {
    let media = tempfile::tempdir().expect("media dir");
    let data = tempfile::tempdir().expect("data dir");
    write_media(media.path(), "a.jpg", b"cat on sofa");

    let provider = Arc::new(StubProvider::new());
    {
        let mut scripted = provider.activity_facts.lock().expect("lock");
        scripted.push((
            "cat on sofa".to_string(),
            ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["The owner's cat is named Miso".to_string()],
            },
        ));
        scripted.push((
            "cat in garden".to_string(),
            ActivityAndFacts {
                activity: String::new(),
                knowledge: vec!["The owner's cat is named Miso".to_string()],
            },
        ));
    }

    let metadata = || {
        PresetMetadata::new()
            .with("a.jpg", "2024:06:14 15:30:00", CaptureMethod::Photo)
            .with("b.jpg", "2024:06:20 11:00:00", CaptureMethod::Photo)
    };
    let embedder = || {
        PresetImageEmbedder::new()
            .with(b"cat on sofa", vec![1.0, 0.0])
            .with(b"cat in garden", vec![0.0, 1.0])
    };

    let first = builder(media.path(), data.path(), metadata(), embedder(), provider.clone())
        .build()
        .expect("first build");
    assert_eq!(first.knowledge_graph.knowledge.len(), 1);

    // A second capture mentioning the same fact arrives later.
    write_media(media.path(), "b.jpg", b"cat in garden");
    let second = builder(media.path(), data.path(), metadata(), embedder(), provider)
        .build()
        .expect("second build");

    // Fact count is unchanged; the new mention joined the members list.
    assert_eq!(second.knowledge_graph.knowledge.len(), 1);
    assert_eq!(
        second.knowledge_graph.knowledge[0].members,
        vec!["a.jpg", "b.jpg"]
    );
    assert_eq!(
        second.memory_graph.get("b.jpg").expect("node").knowledge_ids,
        vec![0]
    );
}
