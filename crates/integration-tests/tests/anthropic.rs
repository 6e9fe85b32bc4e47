mod harness;

use std::time::Duration;

use axum::http::StatusCode;
use harness::config::{ConfigBuilder, gateway, test_secrets};
use harness::mock_vendor::{MockVendor, Reply};
use serde_json::json;
use switchboard_config::{ModelCatalogConfig, ProviderKind};
use switchboard_llm::{BlockDelta, ChatMessage, ChatRequest, LlmError, MessageContent, StopReason, StreamEvent};
use tokio_util::sync::CancellationToken;

fn hello_response() -> serde_json::Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-20250514",
        "content": [{"type": "text", "text": "Hello! How can I help?"}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 9, "output_tokens": 7}
    })
}

#[tokio::test]
async fn blocking_chat_returns_text_and_end_turn() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply("/v1/messages", Reply::ok(hello_response()));

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let request = ChatRequest::new(vec![ChatMessage::user("Hi")]);
    let response = gateway.chat("claude", &request).await.unwrap();

    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(response.message.id, "msg_01");
    assert!(matches!(
        response.message.content.as_slice(),
        [MessageContent::Text { text }] if !text.is_empty()
    ));
    assert_eq!(response.usage.unwrap().output_tokens, 7);

    let sent = &mock.requests()[0];
    assert_eq!(sent.header("x-api-key"), Some("test-anthropic-key"));
    assert_eq!(sent.header("anthropic-version"), Some("2023-06-01"));
    assert_eq!(sent.body["model"], "claude-sonnet-4-20250514");
    assert_eq!(sent.body["max_tokens"], 4096);
    assert_eq!(sent.body["messages"][0]["content"][0]["text"], "Hi");
}

#[tokio::test]
async fn streaming_deltas_match_aggregate() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::sse([
            json!({"type": "message_start", "message": {"id": "msg_02", "usage": {"input_tokens": 5, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "lookup"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"a\":"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "1}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 12}}),
            json!({"type": "message_stop"}),
        ]),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let mut events = Vec::new();
    let response = gateway
        .chat_stream(
            "claude",
            &ChatRequest::new(vec![ChatMessage::user("Hi")]),
            &mut |event| events.push(event),
        )
        .await
        .unwrap();

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta { text },
            } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "Hello");
    assert_eq!(response.text(), streamed);

    assert!(matches!(events.first(), Some(StreamEvent::MessageStart { id, .. }) if id == "msg_02"));
    assert_eq!(events.last(), Some(&StreamEvent::MessageStop));
    assert_eq!(response.stop_reason, StopReason::ToolUse);

    let calls: Vec<_> = response.tool_calls().collect();
    assert_eq!(calls, [("toolu_9", "lookup", &json!({"a": 1}))]);
    assert_eq!(response.usage.unwrap().output_tokens, 12);

    assert_eq!(mock.requests()[0].body["stream"], true);
}

#[tokio::test]
async fn cancelling_mid_block_resolves_as_cancelled() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::SseThenStall(vec![
            json!({"type": "message_start", "message": {"id": "msg_03"}}).to_string(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}).to_string(),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "partial"}})
                .to_string(),
        ]),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let cancel = CancellationToken::new();
    let request = ChatRequest::new(vec![ChatMessage::user("Hi")]).with_cancel(cancel.clone());

    let mut events = Vec::new();
    let result = gateway
        .chat_stream("claude", &request, &mut |event| {
            if matches!(event, StreamEvent::ContentBlockDelta { .. }) {
                cancel.cancel();
            }
            events.push(event);
        })
        .await;

    assert!(matches!(result, Err(LlmError::Cancelled)));

    let deltas = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::ContentBlockDelta { .. }))
        .count();
    assert_eq!(deltas, 1);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, StreamEvent::ContentBlockStop { .. } | StreamEvent::MessageStop))
    );
}

#[tokio::test]
async fn in_band_error_fails_the_stream() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::sse([
            json!({"type": "message_start", "message": {"id": "msg_04"}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ]),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let mut events = Vec::new();
    let err = gateway
        .chat_stream(
            "claude",
            &ChatRequest::new(vec![ChatMessage::user("Hi")]),
            &mut |event| events.push(event),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LlmError::StreamVendor { ref error_type, ref message, .. }
            if error_type == "overloaded_error" && message == "Overloaded"
    ));
    assert!(err.is_retryable());
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
}

#[tokio::test]
async fn non_success_status_surfaces_status_and_body() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::Json(
            StatusCode::UNAUTHORIZED,
            json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}),
        ),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let err = gateway
        .chat("claude", &ChatRequest::new(vec![ChatMessage::user("Hi")]))
        .await
        .unwrap_err();

    match err {
        LlmError::VendorHttp { provider, status, body } => {
            assert_eq!(provider, "claude");
            assert_eq!(status, 401);
            assert!(body.contains("invalid x-api-key"));
        }
        other => panic!("expected VendorHttp, got {other:?}"),
    }
    // A definitive status is not retried
    assert_eq!(mock.count("/v1/messages"), 1);
}

#[tokio::test]
async fn stalled_error_body_still_honors_cancellation() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::StatusThenStall(StatusCode::INTERNAL_SERVER_ERROR, "{\"error\":".to_owned()),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .with_request_timeout(Duration::from_secs(30))
        .build();
    let gateway = gateway(&config, test_secrets());

    let cancel = CancellationToken::new();
    let request = ChatRequest::new(vec![ChatMessage::user("Hi")]).with_cancel(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), gateway.chat("claude", &request))
        .await
        .expect("call resolves once the token fires");

    assert!(matches!(result, Err(LlmError::Cancelled)));
    assert_eq!(mock.count("/v1/messages"), 1);
}

#[tokio::test]
async fn stalled_error_body_is_cut_off_by_the_timeout() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::StatusThenStall(StatusCode::INTERNAL_SERVER_ERROR, "{\"error\":".to_owned()),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .with_request_timeout(Duration::from_millis(300))
        .build();
    let gateway = gateway(&config, test_secrets());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        gateway.chat("claude", &ChatRequest::new(vec![ChatMessage::user("Hi")])),
    )
    .await
    .expect("call resolves within the request timeout");

    match result {
        Err(LlmError::VendorHttp { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "{\"error\":");
        }
        other => panic!("expected VendorHttp, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_model_retries_with_registry_fallback() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/messages",
        Reply::Json(
            StatusCode::NOT_FOUND,
            json!({"type": "error", "error": {"type": "not_found_error", "message": "model: claude-2.1"}}),
        ),
    )
    .reply("/v1/messages", Reply::ok(hello_response()));

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .with_models(
            ProviderKind::Anthropic,
            ModelCatalogConfig {
                fallbacks: [("claude-2.1".to_owned(), "claude-3-5-haiku-20241022".to_owned())].into(),
                ..ModelCatalogConfig::default()
            },
        )
        .build();
    let gateway = gateway(&config, test_secrets());

    let request = ChatRequest::new(vec![ChatMessage::user("Hi")]).with_model("claude-2.1");
    let response = gateway.chat_with_fallback("claude", &request).await.unwrap();

    assert_eq!(response.stop_reason, StopReason::EndTurn);

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body["model"], "claude-2.1");
    assert_eq!(requests[1].body["model"], "claude-3-5-haiku-20241022");
}

#[tokio::test]
async fn list_models_prefers_live_listing() {
    let mock = MockVendor::start().await.unwrap();
    mock.reply(
        "/v1/models",
        Reply::ok(json!({
            "data": [
                {"id": "claude-opus-4-20250514", "type": "model"},
                {"id": "claude-sonnet-4-20250514", "type": "model"}
            ],
            "has_more": false
        })),
    );

    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url("/v1"))
        .build();
    let gateway = gateway(&config, test_secrets());

    let models = gateway.provider("claude").unwrap().list_models().await;
    assert_eq!(models, ["claude-opus-4-20250514", "claude-sonnet-4-20250514"]);
    assert_eq!(mock.requests()[0].header("x-api-key"), Some("test-anthropic-key"));
}
