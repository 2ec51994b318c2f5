use clap::Parser;
use mockito::{Matcher, Server, ServerGuard};
use moltbook::{args::Args, runner, CredentialStore, Credentials, Error, MemoryStore};

fn server() -> ServerGuard {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    Server::new()
}

fn store_for(server: &ServerGuard, api_key: Option<&str>) -> MemoryStore {
    MemoryStore::new(Credentials {
        api_key: api_key.map(str::to_string),
        api_base: format!("{}/api/v1", server.url()),
        ..Default::default()
    })
}

fn run(argv: &[&str], store: &MemoryStore) -> anyhow::Result<String> {
    let args = Args::try_parse_from(argv).expect("valid arguments");
    runner::run(args, store)
}

#[test]
fn register_stores_the_returned_key() {
    let mut server = server();
    let mock = server
        .mock("POST", "/api/v1/agents/register")
        .with_status(201)
        .with_body(
            r#"{"agent":{"api_key":"moltbook_new","claim_url":"https://claim","verification_code":"reef-42"}}"#,
        )
        .create();
    let store = store_for(&server, None);

    let output = run(&["moltbook", "register", "clawd", "-d", "hi"], &store).unwrap();

    mock.assert();
    assert!(output.contains("Claim URL: https://claim"));
    assert!(output.contains("reef-42"));
    let saved = store.load();
    assert_eq!(saved.api_key.as_deref(), Some("moltbook_new"));
    assert_eq!(saved.username.as_deref(), Some("clawd"));
}

#[test]
fn auth_saves_key_and_agent_identity() {
    let mut server = server();
    let mock = server
        .mock("GET", "/api/v1/agents/me")
        .match_header("authorization", "Bearer moltbook_key")
        .with_status(200)
        .with_body(r#"{"success":true,"agent":{"id":"a-1","name":"clawd","karma":7}}"#)
        .create();
    let store = store_for(&server, None);

    let output = run(&["moltbook", "auth", "moltbook_key"], &store).unwrap();

    mock.assert();
    assert_eq!(output, "API key saved. Authenticated as clawd.");
    let saved = store.load();
    assert_eq!(saved.api_key.as_deref(), Some("moltbook_key"));
    assert_eq!(saved.agent_id.as_deref(), Some("a-1"));
    assert_eq!(saved.username.as_deref(), Some("clawd"));
}

#[test]
fn auth_with_rejected_key_fails_but_keeps_it() {
    let mut server = server();
    let mock = server
        .mock("GET", "/api/v1/agents/me")
        .with_status(401)
        .with_body(r#"{"error":"Invalid API key"}"#)
        .create();
    let store = store_for(&server, None);

    let err = run(&["moltbook", "auth", "wrong"], &store).unwrap_err();

    mock.assert();
    assert!(
        err.to_string().starts_with("API key saved, but verification failed"),
        "{}",
        err
    );
    assert_eq!(store.load().api_key.as_deref(), Some("wrong"));
}

#[test]
fn blank_environment_key_falls_back_to_the_stored_key() {
    std::env::set_var("MOLTBOOK_API_KEY", "");
    let mut server = server();
    let mock = server
        .mock("GET", "/api/v1/agents/me")
        .match_header("authorization", "Bearer stored")
        .with_status(200)
        .with_body(r#"{"agent":{"name":"clawd"}}"#)
        .create();
    let store = store_for(&server, Some("stored"));

    run(&["moltbook", "me"], &store).unwrap();

    mock.assert();
}

#[test]
fn missing_key_surfaces_as_an_error() {
    std::env::set_var("MOLTBOOK_API_KEY", "");
    let server = server();
    let store = store_for(&server, None);

    let err = run(&["moltbook", "me"], &store).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingApiKey)
    ));
}

#[test]
fn failed_call_becomes_an_error() {
    let mut server = server();
    let mock = server
        .mock("GET", "/api/v1/posts/missing")
        .match_header("authorization", "Bearer k")
        .with_status(404)
        .with_body(r#"{"error":"Post not found"}"#)
        .create();
    let store = store_for(&server, None);

    let err = run(&["moltbook", "--api-key", "k", "show", "missing"], &store).unwrap_err();

    mock.assert();
    assert_eq!(err.to_string(), "Post not found");
}

#[test]
fn json_flag_prints_the_raw_body() {
    let mut server = server();
    let mock = server
        .mock("GET", "/api/v1/submolts")
        .match_header("authorization", Matcher::Any)
        .with_status(200)
        .with_body(r#"{"submolts":[{"name":"general"}]}"#)
        .create();
    let store = store_for(&server, None);

    let output = run(&["moltbook", "--api-key", "k", "--json", "submolts"], &store).unwrap();

    mock.assert();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["submolts"][0]["name"], "general");
}
