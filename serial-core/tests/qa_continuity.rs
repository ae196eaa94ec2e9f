//! Continuity enforcement through the full pipeline: unregistered
//! names, stage-banned patterns, element reuse, and foreshadowing
//! payoff.

use serial_core::recorder::CommitOutcome;
use serial_core::state::CharacterRecord;
use serial_core::testing::TestHarness;
use serial_core::validator::ViolationKind;
use tempfile::TempDir;

fn reply_with_content(number: u32, title: &str, level: u8, content: &str) -> String {
    format!(
        "CHAPTER_NUMBER: {number}\n\
         TITLE: {title}\n\
         EMOTIONAL_TONE: tense\n\
         ROMANCE_LEVEL: {level}\n\
         CONTENT:\n\
         {content}\n"
    )
}

#[tokio::test]
async fn unregistered_character_is_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let reply = reply_with_content(
        1,
        "A Stranger",
        5,
        "At dusk Aria crossed the courtyard, where Seraphine waited with a drawn blade.",
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();

    let report = match outcome {
        CommitOutcome::Rejected(report) => report,
        other => panic!("expected Rejected, got {other:?}"),
    };
    assert!(report.has_kind(ViolationKind::Continuity));
    assert!(report
        .violations
        .iter()
        .any(|v| v.message.contains("Seraphine")));
    assert_eq!(harness.state().await.chapter_count(), 0);
}

#[tokio::test]
async fn newly_registered_character_is_accepted() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let reply = reply_with_content(
        1,
        "A Stranger",
        5,
        "At dusk Aria crossed the courtyard, where Seraphine waited with a drawn blade.",
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Rejected(_)));

    // Register the character and the same draft commits.
    harness
        .engine
        .store()
        .upsert_character(&harness.slug, "Seraphine", CharacterRecord::new("rival"))
        .await
        .unwrap();

    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));
}

#[tokio::test]
async fn aliases_pass_the_character_check() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    // "the Stormcaller" is an alias of Aria in the stock seed.
    let reply = reply_with_content(
        1,
        "Names",
        5,
        "The guards whispered when Kael passed, and called her Stormcaller behind her back.",
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(
        matches!(outcome, CommitOutcome::Committed { .. }),
        "got {outcome:?}"
    );
}

#[tokio::test]
async fn banned_pattern_is_stage_scoped() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let reply = reply_with_content(
        1,
        "Too Soon",
        8,
        "Before the week was out Kael spoke of a wedding, and Aria laughed at him.",
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();

    let report = match outcome {
        CommitOutcome::Rejected(report) => report,
        other => panic!("expected Rejected, got {other:?}"),
    };
    assert!(report
        .violations
        .iter()
        .any(|v| v.message.contains("wedding")));
}

#[tokio::test]
async fn consumed_element_cannot_recur() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let first = format!(
        "CHAPTER_NUMBER: 1\n\
         TITLE: The Ambush\n\
         EMOTIONAL_TONE: tense\n\
         ROMANCE_LEVEL: 5\n\
         USED_ELEMENTS: storm ambush\n\
         CONTENT:\n\
         Aria and Kael fought back to back when the raiders struck in the rain.\n"
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &first).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    // The same beat reappearing in prose is flagged as continuity reuse.
    let second = reply_with_content(
        2,
        "Again",
        10,
        "Another storm ambush caught Aria on the road before the keep.",
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &second).await.unwrap();
    let report = match outcome {
        CommitOutcome::Rejected(report) => report,
        other => panic!("expected Rejected, got {other:?}"),
    };
    assert!(report
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::Continuity && v.message.contains("storm ambush")));
}

#[tokio::test]
async fn declared_foreshadowing_payoff_resolves_the_hint() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    // Plant a hint directly in stored state.
    let store = harness.engine.store();
    let mut state = store.load_existing(&harness.slug).await.unwrap();
    state.plot.plant_foreshadowing("the sealed letter", 1);
    store.save(&harness.slug, &state).await.unwrap();

    let reply = format!(
        "CHAPTER_NUMBER: 1\n\
         TITLE: The Letter Opened\n\
         EMOTIONAL_TONE: tense\n\
         ROMANCE_LEVEL: 5\n\
         RESOLVES_FORESHADOWING: the sealed letter\n\
         CONTENT:\n\
         Aria finally broke the wax and read what her mother had hidden from Kael.\n"
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    let state = harness.state().await;
    assert_eq!(state.plot.pending_foreshadowing().count(), 0);
    assert!(state.plot.foreshadowing[0].resolved);
}

#[tokio::test]
async fn character_updates_land_in_state() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new(dir.path()).await;

    let reply = format!(
        "CHAPTER_NUMBER: 1\n\
         TITLE: The March\n\
         EMOTIONAL_TONE: wary\n\
         ROMANCE_LEVEL: 5\n\
         CHARACTER_UPDATE: Aria | location=the border keep | emotion=wary\n\
         CHARACTER_UPDATE: Kael | location=the border keep | power=35\n\
         CONTENT:\n\
         By nightfall Aria and Kael had reached the keep together.\n"
    );
    let outcome = harness.engine.commit_chapter(&harness.slug, &reply).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    let state = harness.state().await;
    let aria = state.characters.get("Aria").unwrap();
    assert_eq!(aria.current.location, "the border keep");
    assert_eq!(aria.current.emotion, "wary");
    let kael = state.characters.get("Kael").unwrap();
    assert_eq!(kael.current.power_level, 35);
}
