mod common;

use std::time::Duration;

use algoai::llm::{self, Completion, LlmConfig, RetryPolicy, NO_RESPONSE};
use algoai::prompt::{Assembly, PromptAssembler, PromptContext, PromptPlan};

use common::{completion, failure, spawn_upstream};

fn plan(prompt: &str) -> PromptPlan {
    match PromptAssembler::default().build(&PromptContext::default(), prompt, false) {
        Assembly::Call(plan) => plan,
        Assembly::Reply { .. } => panic!("expected a remote call"),
    }
}

#[tokio::test]
async fn first_success_is_returned() {
    let up = spawn_upstream(vec![completion("  Binary search halves the range.  ")]).await;
    let out = llm::complete(&up.config(), &plan("explain binary search")).await;
    let r = match out {
        Completion::Ok(r) => r,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(r.content, "Binary search halves the range.");
    assert_eq!(r.attempts, 1);
    assert_eq!(r.model, "test-model");
    assert_eq!(r.usage.unwrap().prompt_tokens, 12);
    assert_eq!(up.hits(), 1);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let up = spawn_upstream(vec![failure(503), failure(500), completion("ok now")]).await;
    let out = llm::complete(&up.config(), &plan("what is a heap?")).await;
    let r = match out {
        Completion::Ok(r) => r,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(r.attempts, 3);
    assert_eq!(r.content, "ok now");
    assert_eq!(up.hits(), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let up = spawn_upstream(vec![failure(500)]).await;
    let out = llm::complete(&up.config(), &plan("what is a heap?")).await;
    match &out {
        Completion::Failed { attempts, reason } => {
            assert_eq!(*attempts, 3);
            assert!(reason.contains("500"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(up.hits(), 3);
    assert!(out.into_reply().starts_with("Error: completion API failed after 3 attempts"));
}

#[tokio::test]
async fn empty_completion_is_not_retried() {
    let up = spawn_upstream(vec![completion("   ")]).await;
    let out = llm::complete(&up.config(), &plan("what is a heap?")).await;
    assert!(matches!(out, Completion::Empty));
    assert_eq!(up.hits(), 1);
    assert_eq!(out.into_reply(), NO_RESPONSE);
}

#[tokio::test]
async fn malformed_envelope_is_retried() {
    let up = spawn_upstream(vec![(200, serde_json::json!({ "unexpected": true }))]).await;
    let out = llm::complete(&up.config(), &plan("what is a heap?")).await;
    assert!(matches!(out, Completion::Failed { attempts: 3, .. }));
    assert_eq!(up.hits(), 3);
}

#[tokio::test]
async fn single_attempt_policy() {
    let up = spawn_upstream(vec![failure(502)]).await;
    let cfg = up.config().with_retry(RetryPolicy { max_attempts: 1, base_delay: Duration::from_millis(1) });
    let out = llm::complete(&cfg, &plan("what is a heap?")).await;
    assert!(matches!(out, Completion::Failed { attempts: 1, .. }));
    assert_eq!(up.hits(), 1);
}

#[tokio::test]
async fn unreachable_endpoint_fails() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cfg = LlmConfig::new(format!("http://{addr}/v1/chat/completions"), "k", "m", Duration::from_secs(2))
        .unwrap()
        .with_retry(RetryPolicy { max_attempts: 2, base_delay: Duration::from_millis(1) });
    let out = llm::complete(&cfg, &plan("what is a heap?")).await;
    assert!(matches!(out, Completion::Failed { attempts: 2, .. }));
}

#[tokio::test]
async fn request_carries_plan_parameters() {
    let up = spawn_upstream(vec![completion("fine")]).await;
    let p = plan("who made you?");
    llm::chat_completion(&up.config(), &p).await.unwrap();

    let sent = up.last_request();
    assert_eq!(sent["max_tokens"], 600);
    assert_eq!(sent["temperature"], 0.3);
    assert_eq!(sent["messages"].as_array().unwrap().len(), p.messages.len());
}
