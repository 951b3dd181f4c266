mod common;

use chainpipe::rchain::api_docs::NUMBERS_API_DOCS;
use chainpipe::rchain::chains::{ApiChain, ChainError, load_qa_chain};
use chainpipe::rchain::chat_models::ChatOpenAI;
use chainpipe::rchain::documents::Document;
use chainpipe::rchain::messages::ChatMessage;
use chainpipe::rchain::provider::ChatModelError;
use common::{body_text, completion};
use httpmock::prelude::*;
use serde_json::json;

fn chat(server: &MockServer) -> ChatOpenAI {
    ChatOpenAI::new("gpt-test", "sk-test")
        .expect("client should build")
        .with_temperature(0.0)
        .with_base_url(server.base_url())
}

fn asks_for_url(req: &HttpMockRequest) -> bool {
    let body = body_text(req);
    body.contains("API url:") && !body.contains("Summary:")
}

#[tokio::test]
async fn invoke_sends_model_messages_and_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test")
            .json_body(json!({
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "2+2?"}],
                "temperature": 0.0
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(completion("4"));
    });

    let reply = chat(&server)
        .invoke(&[ChatMessage::user("2+2?")])
        .await
        .expect("invoke should succeed");

    mock.assert();
    assert_eq!(reply.content, "4");
    let usage = reply.usage.expect("usage should be reported");
    assert_eq!(usage.total_tokens, Some(14));
}

#[tokio::test]
async fn api_errors_keep_status_and_body() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(401)
            .body("{\"error\":{\"message\":\"Incorrect API key provided\"}}");
    });

    let err = chat(&server)
        .predict("hello")
        .await
        .expect_err("401 should fail");

    match err {
        ChatModelError::Api { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert!(body.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn blank_content_is_an_empty_response() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion("   "));
    });

    let err = chat(&server)
        .predict("hello")
        .await
        .expect_err("blank content should fail");
    assert!(matches!(err, ChatModelError::EmptyResponse));
}

#[tokio::test]
async fn qa_chain_stuffs_every_document_once() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Page one text.\\n\\nPage two text.")
            .body_contains("\"content\":\"Which page mentions two?\"");
        then.status(200).json_body(completion("Page two."));
    });

    let documents = vec![
        Document::new("Page one text."),
        Document::new("Page two text."),
    ];
    let answer = load_qa_chain(chat(&server))
        .run(&documents, "Which page mentions two?")
        .await
        .expect("qa chain should succeed");

    mock.assert_hits(1);
    assert_eq!(answer.answer, "Page two.");
}

#[tokio::test]
async fn api_chain_calls_generated_url_and_summarizes() {
    let server = MockServer::start_async().await;
    let api_url = server.url("/42/trivia?json");

    let url_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Tell me about 42")
            .matches(asks_for_url);
        then.status(200).json_body(completion(&format!("`{api_url}`")));
    });
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/42/trivia")
            .query_param_exists("json")
            .query_param("api-key", "secret-123");
        then.status(200)
            .json_body(json!({"text": "42 is the answer to everything.", "number": 42}));
    });
    let summary_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Summary:")
            .body_contains("42 is the answer to everything.");
        then.status(200)
            .json_body(completion("42 is the answer to everything."));
    });

    let chain = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .allow_domain("127.0.0.1")
        .with_query_param("api-key", "secret-123");
    let answer = chain
        .run("Tell me about 42")
        .await
        .expect("api chain should succeed");

    url_mock.assert_hits(1);
    api_mock.assert_hits(1);
    summary_mock.assert_hits(1);
    assert_eq!(answer.api_url, api_url);
    assert!(!answer.api_url.contains("secret-123"));
    assert_eq!(answer.answer, "42 is the answer to everything.");
    assert_eq!(answer.usage.and_then(|usage| usage.total_tokens), Some(28));
}

#[tokio::test]
async fn api_chain_refuses_hosts_outside_allow_list() {
    let server = MockServer::start_async().await;
    let url_mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200)
            .json_body(completion("http://attacker.example/steal?data=1"));
    });

    let chain = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build");
    let err = chain
        .run("Tell me about 7")
        .await
        .expect_err("foreign host should be refused");

    url_mock.assert_hits(1);
    match err {
        ChainError::DisallowedDomain { host, allowed } => {
            assert_eq!(host, "attacker.example");
            assert_eq!(allowed, vec!["numbersapi.com".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn api_chain_reports_failing_api_status() {
    let server = MockServer::start_async().await;
    let api_url = server.url("/7/math");
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(completion(&api_url));
    });
    server.mock(|when, then| {
        when.method(GET).path("/7/math");
        then.status(503).body("maintenance");
    });

    let chain = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .with_limit_to_domains(["127.0.0.1"]);
    let err = chain.run("math fact about 7").await.expect_err("503 should fail");

    assert!(matches!(err, ChainError::ApiStatus { .. }));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn api_chain_truncates_long_responses_before_summary() {
    let server = MockServer::start_async().await;
    let api_url = server.url("/big");
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .matches(asks_for_url);
        then.status(200).json_body(completion(&api_url));
    });
    server.mock(|when, then| {
        when.method(GET).path("/big");
        then.status(200).body("abcdefghij".repeat(100));
    });
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions").body_contains("Summary:");
        then.status(200).json_body(completion("short"));
    });

    let chain = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .allow_domain("127.0.0.1")
        .with_max_response_chars(25);
    let answer = chain.run("how big?").await.expect("chain should succeed");

    assert_eq!(answer.api_response, "abcdefghijabcdefghijabcde");
}

#[tokio::test]
async fn api_chain_sends_extra_headers() {
    use reqwest::header::{HeaderName, HeaderValue};

    let server = MockServer::start_async().await;
    let api_url = server.url("/3/year");
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .matches(asks_for_url);
        then.status(200).json_body(completion(&api_url));
    });
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/3/year").header("x-api-key", "h-secret");
        then.status(200).body("3 BC is a year.");
    });
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions").body_contains("Summary:");
        then.status(200).json_body(completion("A year."));
    });

    let answer = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .allow_domain("127.0.0.1")
        .with_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("h-secret"),
        )
        .run("year fact for 3")
        .await
        .expect("chain should succeed");

    api_mock.assert_hits(1);
    assert_eq!(answer.answer, "A year.");
}

#[tokio::test]
async fn api_chain_refuses_redirect_to_foreign_host() {
    let server = MockServer::start_async().await;
    let api_url = server.url("/start");
    let foreign_url = format!("http://localhost:{}/internal", server.port());
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .matches(asks_for_url);
        then.status(200).json_body(completion(&api_url));
    });
    let start_mock = server.mock(|when, then| {
        when.method(GET).path("/start");
        then.status(302).header("location", foreign_url.as_str());
    });
    let internal_mock = server.mock(|when, then| {
        when.method(GET).path("/internal");
        then.status(200).body("internal-only data");
    });
    let summary_mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions").body_contains("Summary:");
        then.status(200).json_body(completion("leaked"));
    });

    let err = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .with_limit_to_domains(["127.0.0.1"])
        .run("fact about 1")
        .await
        .expect_err("redirect off the allow-list should fail");

    start_mock.assert_hits(1);
    internal_mock.assert_hits(0);
    summary_mock.assert_hits(0);
    match err {
        ChainError::DisallowedDomain { host, allowed } => {
            assert_eq!(host, "localhost");
            assert_eq!(allowed, vec!["127.0.0.1".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn api_chain_follows_redirect_on_allowed_host() {
    let server = MockServer::start_async().await;
    let api_url = server.url("/old");
    let new_url = server.url("/new");
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .matches(asks_for_url);
        then.status(200).json_body(completion(&api_url));
    });
    server.mock(|when, then| {
        when.method(GET).path("/old");
        then.status(301).header("location", new_url.as_str());
    });
    let new_mock = server.mock(|when, then| {
        when.method(GET).path("/new");
        then.status(200).body("moved fact");
    });
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions").body_contains("Summary:");
        then.status(200).json_body(completion("A moved fact."));
    });

    let answer = ApiChain::from_llm_and_api_docs(chat(&server), NUMBERS_API_DOCS)
        .expect("chain should build")
        .with_limit_to_domains(["127.0.0.1"])
        .run("fact about 2")
        .await
        .expect("same-host redirect should be followed");

    new_mock.assert_hits(1);
    assert_eq!(answer.api_url, api_url);
    assert_eq!(answer.api_response, "moved fact");
}
