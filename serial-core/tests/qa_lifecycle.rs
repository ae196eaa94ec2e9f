//! End-to-end lifecycle coverage: a novel moves NotStarted -> Active ->
//! Completing -> Completed, chapters stay contiguous, and progression
//! never moves backward.

use serial_core::engine::{EngineConfig, EngineError, NovelEngine};
use serial_core::recorder::CommitOutcome;
use serial_core::state::NovelStatus;
use serial_core::store::StoreError;
use serial_core::testing::{chapter_reply, sample_seed, MockGenerator, TestHarness};
use tempfile::TempDir;

#[tokio::test]
async fn full_novel_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        completion_threshold: Some(3),
        ..EngineConfig::default()
    };
    let harness = TestHarness::with_config(dir.path(), config).await;

    // Opening the novel activates it before any chapter exists.
    assert_eq!(harness.state().await.metadata.status, NovelStatus::Active);

    let mut last_overall = 0.0_f32;
    for (number, title, level) in [(1, "Arrival", 5), (2, "The Keep", 12), (3, "The Letter", 18)] {
        let chapter = harness.commit_reply(chapter_reply(number, title, level)).await;
        assert_eq!(chapter.record.number, number);

        let state = harness.state().await;
        assert_eq!(state.metadata.status, NovelStatus::Active);
        assert_eq!(state.chapter_count(), number);
        assert_eq!(state.current_romance_level(), level);

        let overall = state.progression.overall();
        assert!(
            overall >= last_overall,
            "progression moved backward: {overall} < {last_overall}"
        );
        last_overall = overall;
    }

    let plan = harness.engine.request_completion(&harness.slug).await.unwrap();
    assert!(plan.prompt.contains("ENDING_TYPE"));
    assert_eq!(
        harness.state().await.metadata.status,
        NovelStatus::Completing
    );

    // Requesting completion again is harmless while Completing.
    harness.engine.request_completion(&harness.slug).await.unwrap();

    let epilogue = format!(
        "{}\nENDING_TYPE: happy_ending",
        chapter_reply(4, "Epilogue", 25)
    );
    harness.commit_reply(epilogue).await;

    let state = harness.state().await;
    assert_eq!(state.metadata.status, NovelStatus::Completed);
    assert_eq!(state.chapter_count(), 4);

    // Terminal: nothing gets in after the epilogue.
    let generator = MockGenerator::new(vec![chapter_reply(5, "More", 30)]);
    assert!(matches!(
        harness.engine.run_chapter_cycle(&harness.slug, &generator).await,
        Err(EngineError::Store(StoreError::ClosedNovel { .. }))
    ));
    assert!(matches!(
        harness.engine.request_completion(&harness.slug).await,
        Err(EngineError::Store(StoreError::ClosedNovel { .. }))
    ));
}

#[tokio::test]
async fn completion_refused_before_threshold() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        completion_threshold: Some(5),
        ..EngineConfig::default()
    };
    let harness = TestHarness::with_config(dir.path(), config).await;

    harness.commit_reply(chapter_reply(1, "Arrival", 5)).await;

    let err = harness.engine.request_completion(&harness.slug).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::CompletionNotReady { committed: 1, required: 5, .. }
    ));
    assert_eq!(harness.state().await.metadata.status, NovelStatus::Active);
}

#[tokio::test]
async fn retried_commit_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let reply = chapter_reply(1, "Arrival", 5);
    let first = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(matches!(first, CommitOutcome::Committed { .. }));

    let second = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    let record = match second {
        CommitOutcome::AlreadyCommitted(record) => record,
        other => panic!("expected AlreadyCommitted, got {other:?}"),
    };
    assert_eq!(record.number, 1);

    let state = harness.state().await;
    assert_eq!(state.chapter_count(), 1);
    assert_eq!(state.plot.completed_events.len(), 1);
}

#[tokio::test]
async fn chapter_numbers_stay_contiguous() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    harness.commit_reply(chapter_reply(1, "Arrival", 5)).await;

    // A draft declaring a future number is refused outright.
    let err = harness
        .engine
        .commit_chapter(&harness.slug, &chapter_reply(7, "Skip Ahead", 12))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Validation(_))));

    let state = harness.state().await;
    assert_eq!(state.chapter_count(), 1);
    for (index, chapter) in state.chapters.iter().enumerate() {
        assert_eq!(chapter.number, index as u32 + 1);
    }
}

#[tokio::test]
async fn duplicate_title_cannot_open_twice() {
    let dir = TempDir::new().unwrap();
    let engine = NovelEngine::new(dir.path());

    engine.start_new_novel(sample_seed()).await.unwrap();
    let err = engine.start_new_novel(sample_seed()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(StoreError::Conflict { .. })
    ));
}
