//! Pacing enforcement through the full pipeline: premature jumps are
//! rejected, retries run with tightened constraints and conservative
//! creativity, and slow progression stays advisory.

use serial_core::engine::EngineError;
use serial_core::generator::Creativity;
use serial_core::recorder::CommitOutcome;
use serial_core::testing::{chapter_reply, MockGenerator, TestHarness};
use serial_core::validator::{Severity, ViolationKind};
use tempfile::TempDir;

#[tokio::test]
async fn premature_romance_jump_is_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;
    harness.commit_reply(chapter_reply(1, "Arrival", 5)).await;

    // Chapter 2 of 20 is deep introduction; jumping to 80 is a
    // critical pacing violation.
    let outcome = harness
        .engine
        .commit_chapter(&harness.slug, &chapter_reply(2, "Too Fast", 80))
        .await
        .unwrap();
    let report = match outcome {
        CommitOutcome::Rejected(report) => report,
        other => panic!("expected Rejected, got {other:?}"),
    };
    assert!(report.has_kind(ViolationKind::Pacing));
    assert_eq!(report.violations[0].severity, Severity::Critical);
    assert!(!report.suggestions.is_empty());
    assert_eq!(harness.state().await.chapter_count(), 1);

    // A modest step commits fine.
    let outcome = harness
        .engine
        .commit_chapter(&harness.slug, &chapter_reply(2, "The Keep", 12))
        .await
        .unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));
}

#[tokio::test]
async fn runaway_progression_delta_is_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    // Chapter 1 of 20: the introduction plot cap is 12 and the expected
    // high is 25; a declared delta of 90 must not reach state.
    let reply = format!(
        "CHAPTER_NUMBER: 1\n\
         TITLE: Everything At Once\n\
         EMOTIONAL_TONE: tense\n\
         ROMANCE_LEVEL: 5\n\
         PLOT_DELTA: 90\n\
         CONTENT:\n\
         Aria broke the siege, unmasked the traitor, and won the war in a night.\n"
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();

    let report = match outcome {
        CommitOutcome::Rejected(report) => report,
        other => panic!("expected Rejected, got {other:?}"),
    };
    assert!(report
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::Pacing && v.message.contains("plot")));

    let state = harness.state().await;
    assert_eq!(state.chapter_count(), 0);
    assert_eq!(
        state.progression.get(serial_core::state::Dimension::Plot),
        0
    );
}

#[tokio::test]
async fn retries_tighten_constraints_and_go_conservative() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let generator = MockGenerator::new(vec![
        chapter_reply(1, "Too Fast", 60),
        chapter_reply(1, "Still Too Fast", 55),
        chapter_reply(1, "Arrival", 5),
    ]);
    let chapter = harness
        .engine
        .run_chapter_cycle(&harness.slug, &generator)
        .await
        .unwrap();

    assert_eq!(chapter.attempts, 3);
    assert_eq!(
        generator.creativities(),
        vec![
            Creativity::Balanced,
            Creativity::Conservative,
            Creativity::Conservative,
        ]
    );

    let prompts = generator.prompts();
    assert!(!prompts[0].contains("Previous Attempt Rejected"));
    assert!(prompts[1].contains("Previous Attempt Rejected"));
    assert!(prompts[2].contains("Previous Attempt Rejected"));
    // Feedback accumulates across retries.
    assert!(prompts[2].len() > prompts[1].len());
}

#[tokio::test]
async fn rejection_after_attempt_budget_leaves_state_clean() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let generator = MockGenerator::new(vec![
        chapter_reply(1, "Bad", 70),
        chapter_reply(1, "Bad Again", 75),
        chapter_reply(1, "Bad Still", 80),
    ]);
    let err = harness
        .engine
        .run_chapter_cycle(&harness.slug, &generator)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Rejected { attempts: 3, .. }));
    assert_eq!(generator.call_count(), 3);

    let state = harness.state().await;
    assert_eq!(state.chapter_count(), 0);
    assert_eq!(state.progression.overall(), 0.0);
}

#[tokio::test]
async fn slow_progression_is_advisory_not_blocking() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    // Hold romance flat at 10 well past where the ideal line expects
    // more. Every chapter must still commit.
    for number in 1..=10 {
        let level = if number == 1 { 8 } else { 10 };
        harness
            .commit_reply(chapter_reply(number, &format!("Chapter {number}"), level))
            .await;
    }

    let state = harness.state().await;
    assert_eq!(state.chapter_count(), 10);
    assert_eq!(state.current_romance_level(), 10);
}

#[tokio::test]
async fn lagging_romance_gets_a_bold_first_draft() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    // Hold romance at 10 through chapter 7; chapter 8's expected low is
    // 20, so the novel is now pacing-behind.
    for number in 1..=7 {
        harness
            .commit_reply(chapter_reply(number, &format!("Chapter {number}"), 10))
            .await;
    }

    let generator = MockGenerator::new(vec![chapter_reply(8, "Catching Fire", 25)]);
    let chapter = harness
        .engine
        .run_chapter_cycle(&harness.slug, &generator)
        .await
        .unwrap();

    assert_eq!(chapter.attempts, 1);
    assert_eq!(generator.creativities(), vec![Creativity::Bold]);
}

#[tokio::test]
async fn unparsable_reply_burns_an_attempt() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let generator = MockGenerator::new(vec![
        "I would be happy to write that chapter for you!".to_string(),
        chapter_reply(1, "Arrival", 5),
    ]);
    let chapter = harness
        .engine
        .run_chapter_cycle(&harness.slug, &generator)
        .await
        .unwrap();

    assert_eq!(chapter.attempts, 2);
    let prompts = generator.prompts();
    assert!(prompts[1].contains("could not be parsed"));
}
