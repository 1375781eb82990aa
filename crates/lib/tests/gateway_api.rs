//! Integration test: start the gateway with a stub daemon binary, log in, and
//! drive the commands and run endpoints end to end. Does not require a real
//! fedd installation; the stub echoes its argument vector.

#![cfg(unix)]

use lib::config::Config;
use lib::gateway;
use std::path::PathBuf;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Create a temp install: a basedir carrying the server.json layout marker and
/// an executable stub that echoes its argv.
fn temp_install() -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;
    let dir = std::env::temp_dir().join(format!("fedadmin-test-{}", uuid::Uuid::new_v4()));
    let basedir = dir.join("data");
    std::fs::create_dir_all(&basedir).expect("create basedir");
    std::fs::write(basedir.join("server.json"), b"{}").expect("write marker");
    let bin = dir.join("fedd-stub");
    std::fs::write(&bin, "#!/bin/sh\necho \"$@\"\n").expect("write stub");
    let mut perms = std::fs::metadata(&bin).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&bin, perms).expect("chmod");
    (basedir, bin)
}

fn test_config(port: u16, basedir: &PathBuf, bin: &PathBuf) -> Config {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.admin.pass = Some("hunter2".to_string());
    config.daemon.basedir = Some(basedir.clone());
    config.daemon.bin = Some(bin.clone());
    config
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

async fn wait_for_health(client: &reqwest::Client, base: &str) {
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/health", base)).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not come up on {} within 5s", base);
}

#[tokio::test]
async fn login_commands_and_run_roundtrip() {
    let port = free_port();
    let (basedir, bin) = temp_install();
    let config = test_config(port, &basedir, &bin);

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = client();
    wait_for_health(&client, &base).await;

    // Unauthenticated API calls are 401 with a generic body.
    let res = client
        .get(format!("{}/api/commands", base))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 401);

    // Unauthenticated page requests redirect to the login form.
    let res = client.get(&base).send().await.expect("send");
    assert!(res.status().is_redirection());
    assert_eq!(
        res.headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );

    // Wrong password: 401 and no cookie.
    let res = client
        .post(format!("{}/login", base))
        .form(&[("user", "admin"), ("pass", "wrong")])
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 401);
    assert!(res.headers().get("set-cookie").is_none());

    // Wrong username with the right password reads identically.
    let res = client
        .post(format!("{}/login", base))
        .form(&[("user", "root"), ("pass", "hunter2")])
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 401);

    // Correct login sets the session cookie and redirects to the UI.
    let res = client
        .post(format!("{}/login", base))
        .form(&[("user", "admin"), ("pass", "hunter2")])
        .send()
        .await
        .expect("send");
    assert!(res.status().is_redirection());
    assert!(res.headers().get("set-cookie").is_some());

    // The commands listing now returns the full registry.
    let res = client
        .get(format!("{}/api/commands", base))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(
        json.get("basedir").and_then(|v| v.as_str()),
        Some(basedir.display().to_string().as_str())
    );
    let commands = json
        .get("commands")
        .and_then(|v| v.as_array())
        .expect("commands array");
    assert!(commands
        .iter()
        .any(|c| c.get("name").and_then(|v| v.as_str()) == Some("state")));
    assert!(commands
        .iter()
        .any(|c| c.get("name").and_then(|v| v.as_str()) == Some("adduser")));

    // Zero-arg run: argv is exactly [command, basedir].
    let res = client
        .post(format!("{}/api/run", base))
        .json(&serde_json::json!({ "command": "state", "args": {} }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(json.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(json.get("code").and_then(|v| v.as_i64()), Some(0));
    let argv: Vec<&str> = json
        .get("argv")
        .and_then(|v| v.as_array())
        .expect("argv")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(argv, vec!["state", basedir.display().to_string().as_str()]);

    // Arguments pass through validated and trimmed.
    let res = client
        .post(format!("{}/api/run", base))
        .json(&serde_json::json!({ "command": "adduser", "args": { "uid": "  walter  " } }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    let json: serde_json::Value = res.json().await.expect("json");
    let stdout = json.get("stdout").and_then(|v| v.as_str()).expect("stdout");
    assert!(stdout.ends_with("walter\n"), "stdout: {:?}", stdout);

    // Unknown command names are rejected before any validation or spawn.
    let res = client
        .post(format!("{}/api/run", base))
        .json(&serde_json::json!({ "command": "rm", "args": {} }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 400);
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(
        json.get("error").and_then(|v| v.as_str()),
        Some("command not allowed")
    );

    // Missing required argument: 400 with a field-level message, no run.
    let res = client
        .post(format!("{}/api/run", base))
        .json(&serde_json::json!({ "command": "adduser", "args": {} }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 400);
    let json: serde_json::Value = res.json().await.expect("json");
    assert!(json
        .get("error")
        .and_then(|v| v.as_str())
        .is_some_and(|e| e.contains("uid")));

    // Malformed identifier: rejected with the argument named.
    let res = client
        .post(format!("{}/api/run", base))
        .json(&serde_json::json!({ "command": "adduser", "args": { "uid": "../etc" } }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 400);

    // Logout clears the cookie; the API is 401 again.
    let res = client
        .get(format!("{}/logout", base))
        .send()
        .await
        .expect("send");
    assert!(res.status().is_redirection());
    let res = client
        .get(format!("{}/api/commands", base))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn rate_limiter_returns_429_over_the_window_budget() {
    let port = free_port();
    let (basedir, bin) = temp_install();
    let mut config = test_config(port, &basedir, &bin);
    config.rate_limit.limit = 3;
    config.rate_limit.window_ms = 60_000;

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = client();
    wait_for_health(&client, &base).await;

    // wait_for_health spent one request; two more fit the budget.
    for _ in 0..2 {
        let res = client
            .get(format!("{}/health", base))
            .send()
            .await
            .expect("send");
        assert_eq!(res.status(), 200);
    }
    let res = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 429);
}

#[tokio::test]
async fn startup_refuses_a_basedir_without_marker() {
    let dir = std::env::temp_dir().join(format!("fedadmin-nomarker-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create dir");

    let mut config = Config::default();
    config.gateway.port = free_port();
    config.admin.pass = Some("hunter2".to_string());
    config.daemon.basedir = Some(dir.clone());

    let err = gateway::run_gateway(config)
        .await
        .expect_err("must refuse to start");
    assert!(err.to_string().contains("server.json"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn startup_refuses_without_admin_password() {
    let (basedir, bin) = temp_install();
    let mut config = Config::default();
    config.gateway.port = free_port();
    config.daemon.basedir = Some(basedir);
    config.daemon.bin = Some(bin);

    let err = gateway::run_gateway(config)
        .await
        .expect_err("must refuse to start");
    assert!(err.to_string().contains("admin password"));
}
