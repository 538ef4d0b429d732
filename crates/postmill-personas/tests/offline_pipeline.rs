use std::sync::Arc;

use postmill_core::{
    BatchCoordinator, PipelineConfig, Post, PostDraft, PostLifecycleController, PostStatus,
    RevisionOutcome, ValidatorPool,
};
use postmill_personas::{default_panel, DraftPool, RuleReviser, TemplateSynthesizer};
use uuid::Uuid;

const TIDY: &str = "Ship small changes often. Review them the same day. Measure what users actually do. \
Then decide what to build next with the whole team.";

const TERSE: &str = "Too short to impress anyone at all, but still valid here.";

fn rambling() -> String {
    let sentence = format!("{}.", vec!["lorem"; 40].join(" "));
    vec![sentence; 8].join(" ")
}

fn controller() -> PostLifecycleController {
    PostLifecycleController::new(
        ValidatorPool::new(default_panel()),
        Arc::new(TemplateSynthesizer::new()),
        Arc::new(RuleReviser::new()),
        2,
    )
}

fn post(draft: PostDraft) -> Post {
    Post::from_draft(Uuid::new_v4(), 1, draft, 2).unwrap()
}

#[tokio::test]
async fn tidy_post_passes_first_round() {
    let mut p = post(PostDraft::new(TIDY, "engineers").with_hashtags(["#shipping", "#teams"]));

    assert_eq!(controller().resolve(&mut p).await.unwrap(), PostStatus::Approved);
    assert_eq!(p.revision_count(), 0);
    assert_eq!(p.approval_count(), 3);
}

#[tokio::test]
async fn rambling_post_is_repaired_by_rules() {
    let tags: Vec<String> = (0..8).map(|i| format!("#t{i}")).collect();
    let mut p = post(PostDraft::new(rambling(), "everyone").with_hashtags(tags));
    assert_eq!(p.approval_count(), 0);

    let status = controller().resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Approved);
    assert_eq!(p.revision_count(), 1);
    assert_eq!(p.revision_history()[0].outcome, RevisionOutcome::Applied);
    assert!(p.content().chars().count() <= 600);
    assert_eq!(p.hashtags().len(), 5);
    assert_eq!(p.original_content(), Some(rambling().as_str()));
}

#[tokio::test]
async fn terse_post_cannot_be_expanded_mechanically() {
    let mut p = post(PostDraft::new(TERSE, "everyone"));

    let status = controller().resolve(&mut p).await.unwrap();

    assert_eq!(status, PostStatus::Rejected);
    assert_eq!(p.revision_count(), 2);
    assert_eq!(p.content(), TERSE);
    assert!(p
        .revision_history()
        .iter()
        .all(|r| matches!(r.outcome, RevisionOutcome::Failed { .. })));
}

#[tokio::test]
async fn coordinator_runs_a_batch_from_a_draft_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drafts.json");
    let drafts = vec![
        PostDraft::new(TIDY, "engineers").with_hashtags(["#shipping"]),
        PostDraft::new(TERSE, "interns").with_cultural_reference("office sitcoms"),
    ];
    std::fs::write(&path, serde_json::to_string(&drafts).unwrap()).unwrap();

    let pool = DraftPool::load(&path).unwrap();
    let config = PipelineConfig {
        posts_per_batch: 2,
        target_approval_rate: 0.75,
        ..PipelineConfig::default()
    };
    let mut coordinator =
        BatchCoordinator::new(config, Arc::new(pool), controller()).unwrap();

    let batch = coordinator.run_batch().await.unwrap();

    // Initial pass: one tidy approval, one terse rejection. The regeneration
    // pass steers away from the rejected audience and serves the tidy draft.
    assert!(batch.regenerated());
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.posts()[2].target_audience(), "engineers");
    assert_eq!(batch.approved_count(), 2);
    assert_eq!(batch.metrics().total_posts, 3);
}
