use std::sync::Arc;
use std::time::Duration;

use postmill_core::fakes::{
    EchoSynthesizer, FailingReviser, FailingValidator, PanickingValidator, ScriptedValidator,
    SuffixReviser,
};
use postmill_core::{
    FeedbackSynthesizer, Post, PostDraft, PostLifecycleController, PostStatus, Reviser,
    RevisionOutcome, Validator, ValidatorPool,
};
use uuid::Uuid;

const DRAFT: &str = "Lifecycle integration draft that is comfortably past the fifty character floor.";

fn post(max_revisions: u32) -> Post {
    let draft = PostDraft::new(DRAFT, "product managers").with_hashtags(["#ship", "#learn"]);
    Post::from_draft(Uuid::new_v4(), 1, draft, max_revisions).unwrap()
}

fn scripted(name: &str, script: &[f64]) -> Arc<dyn Validator> {
    Arc::new(ScriptedValidator::new(name, script.to_vec()))
}

fn controller_with(
    validators: Vec<Arc<dyn Validator>>,
    reviser: Arc<dyn Reviser>,
    min_approvals: usize,
) -> PostLifecycleController {
    PostLifecycleController::new(
        ValidatorPool::new(validators),
        Arc::new(EchoSynthesizer::new()),
        reviser,
        min_approvals,
    )
}

#[tokio::test]
async fn two_of_three_approvals_pass_the_post() {
    let controller = controller_with(
        vec![
            scripted("skeptic", &[8.0]),
            scripted("optimist", &[6.0]),
            scripted("editor", &[7.5]),
        ],
        Arc::new(SuffixReviser::new()),
        2,
    );
    let mut p = post(2);

    let status = controller.resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Approved);
    assert_eq!(p.approval_count(), 2);
    let approved: Vec<bool> = p.validation_scores().iter().map(|s| s.approved()).collect();
    assert_eq!(approved, vec![true, false, true]);
    assert_eq!(p.revision_count(), 0);
    assert!(p.revision_history().is_empty());
    assert!(p.original_content().is_none());
}

#[tokio::test]
async fn post_below_threshold_every_round_is_rejected_after_budget() {
    let controller = controller_with(
        vec![scripted("a", &[4.0]), scripted("b", &[5.5]), scripted("c", &[6.9])],
        Arc::new(SuffixReviser::new()),
        2,
    );
    let mut p = post(2);

    let status = controller.resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Rejected);
    assert_eq!(p.revision_count(), 2);
    assert_eq!(p.score_rounds().len(), 3);
    assert_eq!(p.revision_history().len(), 2);
    assert!(p.processing_time_ms().is_some());
    assert_ne!(p.content(), DRAFT);
}

#[tokio::test]
async fn post_approved_on_first_revision_keeps_original_content() {
    let reviser = Arc::new(SuffixReviser::new());
    let synthesizer = Arc::new(EchoSynthesizer::new());
    let controller = PostLifecycleController::new(
        ValidatorPool::new(vec![scripted("solo", &[3.0, 9.0])]),
        Arc::clone(&synthesizer) as Arc<dyn FeedbackSynthesizer>,
        Arc::clone(&reviser) as Arc<dyn Reviser>,
        1,
    );
    let mut p = post(2);
    let first_round_content = p.content().to_string();

    let status = controller.resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Approved);
    assert_eq!(p.revision_history().len(), 1);
    assert_eq!(p.original_content(), Some(first_round_content.as_str()));
    assert_ne!(p.content(), first_round_content);
    assert_eq!(p.revision_history()[0].previous_content, first_round_content);
    assert_eq!(p.revision_history()[0].outcome, RevisionOutcome::Applied);
    assert_eq!(synthesizer.calls(), 1);
    assert_eq!(reviser.calls(), 1);

    // Each round is snapshotted against the content it scored.
    let rounds = p.score_rounds();
    assert_eq!(rounds.len(), 2);
    assert_ne!(rounds[0].content_digest(), rounds[1].content_digest());
    assert!(!rounds[0].approved());
    assert!(rounds[1].approved());
}

#[tokio::test]
async fn failed_revisions_still_consume_budget() {
    let reviser = Arc::new(FailingReviser::new());
    let controller = controller_with(
        vec![scripted("solo", &[2.0])],
        Arc::clone(&reviser) as Arc<dyn Reviser>,
        1,
    );
    let mut p = post(2);

    let status = controller.resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Rejected);
    assert_eq!(reviser.calls(), 2);
    assert_eq!(p.revision_count(), 2);
    assert_eq!(p.content(), DRAFT);
    assert!(p
        .revision_history()
        .iter()
        .all(|r| matches!(r.outcome, RevisionOutcome::Failed { .. })));
}

#[tokio::test]
async fn synthesizer_fallback_still_drives_a_revision() {
    let controller = PostLifecycleController::new(
        ValidatorPool::new(vec![scripted("solo", &[1.0, 8.0])]),
        Arc::new(EchoSynthesizer::falling_back()),
        Arc::new(SuffixReviser::new()),
        1,
    );
    let mut p = post(1);

    assert_eq!(controller.resolve(&mut p).await.unwrap(), PostStatus::Approved);
    assert_eq!(p.revision_count(), 1);
}

#[tokio::test]
async fn broken_validators_count_as_non_approvals() {
    let controller = controller_with(
        vec![
            scripted("steady", &[9.0]),
            Arc::new(FailingValidator::new("flaky", "upstream timeout")),
            Arc::new(PanickingValidator::new("broken")),
            scripted("kind", &[7.0]),
        ],
        Arc::new(SuffixReviser::new()),
        2,
    );
    let mut p = post(0);

    let status = controller.resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Approved);
    assert_eq!(p.validation_scores().len(), 4);
    let failures: Vec<&str> = p
        .validation_scores()
        .iter()
        .filter(|s| s.is_failure())
        .map(|s| s.agent_name())
        .collect();
    assert_eq!(failures, vec!["flaky", "broken"]);
}

#[tokio::test]
async fn pool_returns_one_score_per_validator_in_registration_order() {
    let pool = ValidatorPool::new(vec![
        Arc::new(PanickingValidator::new("first")),
        scripted("second", &[7.0]),
        Arc::new(FailingValidator::new("third", "quota")),
    ]);
    let p = post(2);

    let scores = pool.score_all(&p).await;

    let names: Vec<&str> = scores.iter().map(|s| s.agent_name()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert!(scores[0].is_failure());
    assert_eq!(scores[0].score(), 0.0);
    assert!(!scores[0].approved());
    assert!(scores[1].approved());
    assert!(scores[2].is_failure());
}

#[tokio::test(start_paused = true)]
async fn pool_scores_validators_concurrently() {
    let delay = Duration::from_millis(200);
    let validators: Vec<Arc<dyn Validator>> = (0..4)
        .map(|i| {
            Arc::new(ScriptedValidator::new(format!("slow-{i}"), vec![8.0]).with_delay(delay))
                as Arc<dyn Validator>
        })
        .collect();
    let pool = ValidatorPool::new(validators);
    let p = post(2);

    let started = tokio::time::Instant::now();
    let scores = pool.score_all(&p).await;

    assert_eq!(scores.len(), 4);
    assert!(started.elapsed() < delay * 2);
}

#[tokio::test]
async fn revision_budget_never_exceeded() {
    for budget in 0..4 {
        let controller = controller_with(
            vec![scripted("solo", &[1.0])],
            Arc::new(SuffixReviser::new()),
            1,
        );
        let mut p = post(budget);
        controller.resolve(&mut p).await.unwrap();
        assert_eq!(p.status(), PostStatus::Rejected);
        assert_eq!(p.revision_count(), budget);
        assert_eq!(p.score_rounds().len() as u32, budget + 1);
    }
}

#[tokio::test]
async fn stored_posts_cannot_smuggle_in_an_overspent_budget() {
    let controller = controller_with(
        vec![scripted("solo", &[1.0])],
        Arc::new(SuffixReviser::new()),
        1,
    );

    let mut raw = serde_json::to_value(post(2)).unwrap();
    raw["revision_count"] = serde_json::json!(5);
    assert!(serde_json::from_value::<Post>(raw).is_err());

    // A genuine record reloads and keeps its terminal status.
    let mut p = post(2);
    controller.resolve(&mut p).await.unwrap();
    let mut reloaded: Post = serde_json::from_value(serde_json::to_value(&p).unwrap()).unwrap();
    assert_eq!(reloaded.status(), PostStatus::Rejected);
    assert_eq!(reloaded.revision_count(), reloaded.max_revisions());
    assert!(controller.resolve(&mut reloaded).await.is_err());
}
