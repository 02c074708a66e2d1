// tests/livereload_server.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;

use devloop::engine::Session;
use devloop::livereload::server::{hello_message, is_hello, reload_message, PROTOCOL};
use devloop::livereload::{LivereloadServer, ReloadNotifier};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn hello_announces_protocol_seven() -> TestResult {
    let hello: serde_json::Value = serde_json::from_str(&hello_message())?;
    assert_eq!(hello["command"], "hello");
    assert_eq!(hello["protocols"][0], PROTOCOL);
    assert!(PROTOCOL.ends_with("official-7"));
    Ok(())
}

#[test]
fn reload_carries_path_and_live_css() -> TestResult {
    let reload: serde_json::Value = serde_json::from_str(&reload_message("assets/app.css"))?;
    assert_eq!(reload["command"], "reload");
    assert_eq!(reload["path"], "assets/app.css");
    assert_eq!(reload["liveCSS"], true);
    Ok(())
}

#[test]
fn recognises_client_hello() {
    assert!(is_hello(
        r#"{"command":"hello","protocols":["http://livereload.com/protocols/official-7"]}"#
    ));
    assert!(!is_hello(r#"{"command":"info","url":"http://localhost:3000/"}"#));
    assert!(!is_hello("not json"));
}

#[tokio::test]
async fn server_binds_and_tolerates_reloads_without_clients() -> TestResult {
    init_tracing();
    let session = Session::new();
    let server = LivereloadServer::start(0, &session).await?;

    assert_ne!(server.local_addr().port(), 0);
    assert_eq!(server.client_count(), 0);
    server.notify_reload("assets/app.css");

    let probe = tokio::net::TcpStream::connect(("127.0.0.1", server.local_addr().port())).await;
    assert!(probe.is_ok());

    session.cancel();
    Ok(())
}
