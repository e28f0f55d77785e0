//! Integration tests for the refinement loop.
//!
//! These drive the orchestrator end to end against a scripted oracle and
//! check the context and shared log after each call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use trendpost_core::{
    GenerationOracle, OracleError, OracleRequest, OracleResponse, PipelineStepLog,
    RefinablePostContext, RefineError, RefinementOrchestrator, ScriptedOracle, SharedLog,
    StepFields, StepKind, VoiceProfile,
};

// =============================================================================
// Helpers
// =============================================================================

fn voice() -> VoiceProfile {
    serde_json::from_value(json!({
        "communication_style": "technical expert",
        "personality_traits": ["innovative", "analytical"]
    }))
    .unwrap()
}

/// A log holding the generation steps that precede any refinement.
fn generated_log() -> SharedLog {
    let log = SharedLog::new();
    {
        let mut log = log.write();
        log.record_trend_analysis(
            &["https://example.com/super-bowl-blackout".to_string()],
            json!({ "headline": "Stadium goes dark for 34 minutes" }),
            "Super Bowl blackout",
        );
        log.record_post_generation(
            "Question/Discussion",
            "Superbowl organizers just made a HUGE mistake",
            "Hello world #AI",
            "#AI",
        );
    }
    log
}

fn context(log: &SharedLog) -> RefinablePostContext {
    RefinablePostContext::initialize(
        "Super Bowl blackout",
        "Prompt Engineering",
        "Superbowl organizers just made a HUGE mistake",
        "Question/Discussion",
        voice(),
        "Hello world #AI",
        log.clone(),
    )
}

fn orchestrator(oracle: ScriptedOracle) -> (RefinementOrchestrator, Arc<ScriptedOracle>) {
    let oracle = Arc::new(oracle);
    (RefinementOrchestrator::new(oracle.clone()), oracle)
}

/// Oracle that answers with a fixed raw JSON reply.
struct RawReplyOracle(&'static str);

#[async_trait]
impl GenerationOracle for RawReplyOracle {
    async fn refine(&self, _request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        serde_json::from_str(self.0).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

fn refinements(log: &SharedLog) -> usize {
    log.read().count_of(&StepKind::UserRefinement)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_refinement_applies() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(ScriptedOracle::new().then_refine("Hi #AI", &["shortened"]));
    let before = log.len();

    let outcome = refiner.refine(&mut ctx, "make it shorter").await.unwrap();

    assert_eq!(outcome.refined_post, "Hi #AI");
    assert_eq!(ctx.current_post(), "Hi #AI");
    assert_eq!(ctx.refinement_history().len(), 1);
    assert_eq!(ctx.refinement_history()[0].request, "make it shorter");
    assert_eq!(ctx.refinement_history()[0].changes_made, vec!["shortened".to_string()]);
    assert_eq!(log.len(), before + 1);

    let log = log.read();
    let step = log.steps().last().unwrap();
    assert_eq!(step.kind, StepKind::UserRefinement);
    assert_eq!(step.inputs["user_request"].as_str(), Some("make it shorter"));
    assert_eq!(step.inputs["previous_post"].as_str(), Some("Hello world #AI"));
    assert_eq!(step.outputs["refined_post"].as_str(), Some("Hi #AI"));
    assert_eq!(step.owner, Some(ctx.id()));
}

#[tokio::test]
async fn test_reset_after_two_refinements() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(
        ScriptedOracle::new()
            .then_refine("Hi #AI", &["shortened"])
            .then_refine("Hi there #AI #SuperBowl", &["added hashtag"]),
    );

    refiner.refine(&mut ctx, "make it shorter").await.unwrap();
    refiner.refine(&mut ctx, "add a Super Bowl hashtag").await.unwrap();
    assert_eq!(refinements(&log), 2);

    ctx.reset();

    assert_eq!(ctx.current_post(), ctx.original_post());
    assert!(ctx.refinement_history().is_empty());
    assert_eq!(refinements(&log), 0);
    assert_eq!(log.len(), 2);
}

#[test]
fn test_remove_user_refinement_steps() {
    let mut log = PipelineStepLog::new();
    log.append_step(StepKind::TrendAnalysis, StepFields::new(), StepFields::new(), "");
    log.append_step(StepKind::PostGeneration, StepFields::new(), StepFields::new(), "");
    log.append_step(StepKind::UserRefinement, StepFields::new(), StepFields::new(), "");

    log.remove_steps_of_kind(&StepKind::UserRefinement);

    let kinds: Vec<_> = log.steps().iter().map(|s| s.kind.clone()).collect();
    assert_eq!(kinds, vec![StepKind::TrendAnalysis, StepKind::PostGeneration]);
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_current_post_tracks_last_success_only() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(
        ScriptedOracle::new()
            .then_refine("first", &[])
            .then_refine("second", &[])
            .then_fail(OracleError::Provider("rate limited".into()))
            .then_refine("third", &[]),
    );

    refiner.refine(&mut ctx, "one").await.unwrap();
    assert_eq!(ctx.current_post(), "first");
    refiner.refine(&mut ctx, "two").await.unwrap();
    assert_eq!(ctx.current_post(), "second");
    assert!(refiner.refine(&mut ctx, "three").await.is_err());
    assert_eq!(ctx.current_post(), "second");
    refiner.refine(&mut ctx, "three again").await.unwrap();
    assert_eq!(ctx.current_post(), "third");
    assert_eq!(ctx.refinement_count(), 3);
}

#[tokio::test]
async fn test_failures_leave_state_untouched() {
    let failures = [
        OracleError::Provider("502 Bad Gateway".into()),
        OracleError::Transport("connection reset".into()),
    ];

    for failure in failures {
        let log = generated_log();
        let mut ctx = context(&log);
        let (refiner, _) = orchestrator(ScriptedOracle::new().then_fail(failure.clone()));
        let rendered = log.render_text();

        let err = refiner.refine(&mut ctx, "make it shorter").await.unwrap_err();

        assert_eq!(err, RefineError::OracleFailure(failure));
        assert_eq!(ctx.current_post(), "Hello world #AI");
        assert!(ctx.refinement_history().is_empty());
        assert_eq!(log.render_text(), rendered);
    }
}

#[tokio::test]
async fn test_malformed_response_is_rejected() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(ScriptedOracle::new().then_respond(OracleResponse {
        refined_post: "  ".to_string(),
        changes_made: vec!["removed everything".to_string()],
        ..Default::default()
    }));
    let before = log.len();

    let err = refiner.refine(&mut ctx, "make it shorter").await.unwrap_err();

    assert!(matches!(err, RefineError::OracleFailure(OracleError::Malformed(_))));
    assert_eq!(ctx.current_post(), "Hello world #AI");
    assert_eq!(log.len(), before);
}

#[tokio::test]
async fn test_partial_reply_is_rejected() {
    let log = generated_log();
    let mut ctx = context(&log);
    let refiner = RefinementOrchestrator::new(Arc::new(RawReplyOracle(r#"{"refined_post": "Hi #AI"}"#)));
    let rendered = log.render_text();

    let err = refiner.refine(&mut ctx, "make it shorter").await.unwrap_err();

    assert!(matches!(err, RefineError::OracleFailure(OracleError::Malformed(_))));
    assert_eq!(ctx.current_post(), "Hello world #AI");
    assert!(ctx.refinement_history().is_empty());
    assert_eq!(refinements(&log), 0);
    assert_eq!(log.render_text(), rendered);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_an_oracle_failure() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(
        ScriptedOracle::new()
            .with_delay(Duration::from_secs(120))
            .then_refine("too late", &[]),
    );
    let refiner = refiner.with_timeout(Duration::from_secs(5));
    let before = log.len();

    let err = refiner.refine(&mut ctx, "make it shorter").await.unwrap_err();

    assert_eq!(
        err,
        RefineError::OracleFailure(OracleError::Timeout(Duration::from_secs(5)))
    );
    assert_eq!(ctx.current_post(), "Hello world #AI");
    assert!(ctx.refinement_history().is_empty());
    assert_eq!(log.len(), before);
}

#[tokio::test]
async fn test_oracle_receives_history_and_constraints() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, oracle) = orchestrator(ScriptedOracle::new().then_refine("Hi #AI", &[]));

    refiner.refine(&mut ctx, "make it shorter").await.unwrap();

    let requests = oracle.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.current_post, "Hello world #AI");
    assert_eq!(request.user_request, "make it shorter");
    assert!(request.pipeline_history.contains("=== STEP 1: Trend Analysis ==="));
    assert!(request.pipeline_history.contains("=== STEP 2: Post Generation ==="));
    assert!(request.constraints.contains("Super Bowl blackout"));
    assert!(request.constraints.contains("Question/Discussion approach"));
    assert!(request.voice_profile.contains("technical expert"));
}

#[tokio::test]
async fn test_second_refinement_sees_the_first() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, oracle) = orchestrator(
        ScriptedOracle::new()
            .then_refine("Hi #AI", &[])
            .then_refine("Hi! #AI", &[]),
    );

    refiner.refine(&mut ctx, "make it shorter").await.unwrap();
    refiner.refine(&mut ctx, "more energy").await.unwrap();

    let second = &oracle.requests()[1];
    assert_eq!(second.current_post, "Hi #AI");
    assert!(second.pipeline_history.contains("=== STEP 3: User Refinement ==="));
    assert!(second.pipeline_history.contains("user_request: make it shorter"));
}

#[tokio::test]
async fn test_reset_only_removes_own_refinements() {
    let log = generated_log();
    let mut first = context(&log);
    let mut second = context(&log);
    let (refiner, _) = orchestrator(
        ScriptedOracle::new()
            .then_refine("first refined", &[])
            .then_refine("second refined", &[]),
    );

    refiner.refine(&mut first, "shorter").await.unwrap();
    refiner.refine(&mut second, "longer").await.unwrap();

    first.reset();
    first.reset();

    assert_eq!(first.current_post(), "Hello world #AI");
    assert_eq!(second.current_post(), "second refined");
    assert_eq!(refinements(&log), 1);
    assert_eq!(log.read().steps().last().unwrap().owner, Some(second.id()));
}

#[tokio::test]
async fn test_preservation_report_is_advisory() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(ScriptedOracle::new().then_refine("Totally unrelated text", &[]));

    let outcome = refiner.refine(&mut ctx, "rewrite everything").await.unwrap();

    assert!(!outcome.preservation.all_preserved());
    assert_eq!(ctx.current_post(), "Totally unrelated text");
}

#[tokio::test]
async fn test_abandoned_refinement_changes_nothing() {
    let log = generated_log();
    let mut ctx = context(&log);
    let (refiner, _) = orchestrator(
        ScriptedOracle::new()
            .with_delay(Duration::from_millis(200))
            .then_refine("never applied", &[]),
    );
    let before = log.len();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), refiner.refine(&mut ctx, "shorter")).await;

    assert!(abandoned.is_err());
    assert_eq!(ctx.current_post(), "Hello world #AI");
    assert_eq!(log.len(), before);
}
