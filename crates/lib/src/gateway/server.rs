//! Gateway HTTP server: login/session handling, the commands/run JSON API,
//! and the bundled browser UI behind the same session check.
//!
//! Authentication failures are generic (401 for API calls, redirect for
//! pages); validation failures are 400 with a field-level message; execution
//! failures are structured 200-level results.

use crate::commands::CommandRegistry;
use crate::config::{self, Config};
use crate::exec;
use crate::gateway::protocol::{
    CommandsResponse, ErrorBody, LoginForm, RunRequest, RunResponse,
};
use crate::gateway::ratelimit::RateLimiter;
use crate::session::{self, SessionCodec};
use crate::validate;
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use include_dir::{include_dir, Dir};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Session cookie name.
const SESSION_COOKIE: &str = "fedadmin_session";

static UI_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets/ui");

/// Values resolved once at startup from config plus environment overrides.
pub struct Resolved {
    pub admin_user: String,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub basedir: PathBuf,
    pub executable: PathBuf,
    pub run_timeout: Duration,
}

/// Shared state for the gateway; everything is read-only after startup, so
/// concurrent requests need no synchronization.
#[derive(Clone)]
pub struct GatewayState {
    pub codec: Arc<SessionCodec>,
    pub registry: Arc<CommandRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub resolved: Arc<Resolved>,
}

/// Run the gateway server; binds to config.gateway.bind:port and blocks until
/// shutdown (Ctrl+C or SIGTERM). Refuses to start when the admin password or
/// daemon basedir is missing, or the basedir lacks its layout marker.
pub async fn run_gateway(config: Config) -> Result<()> {
    let admin_user = config::resolve_admin_user(&config);
    let admin_pass = config::resolve_admin_pass(&config)
        .context("admin password is required (set admin.pass or FEDADMIN_ADMIN_PASS)")?;
    let secret = config::resolve_session_secret(&config)
        .unwrap_or_else(|| session::derive_secret(&admin_pass));
    let basedir = config::resolve_basedir(&config)
        .context("daemon basedir is required (set daemon.basedir or FEDD_BASEDIR)")?;
    config::check_basedir(&basedir)?;
    let executable = config::resolve_daemon_bin(&config);

    let resolved = Resolved {
        admin_user: admin_user.clone(),
        session_ttl: Duration::from_millis(config.admin.session_ttl_ms),
        cookie_secure: config.gateway.cookie_secure,
        basedir,
        executable,
        run_timeout: Duration::from_millis(config.daemon.timeout_ms),
    };
    let state = GatewayState {
        codec: Arc::new(SessionCodec::new(
            secret.into_bytes(),
            admin_user,
            admin_pass,
        )),
        registry: Arc::new(CommandRegistry::builtin()),
        limiter: Arc::new(RateLimiter::new(
            Duration::from_millis(config.rate_limit.window_ms),
            config.rate_limit.limit,
        )),
        resolved: Arc::new(resolved),
    };

    log::info!("daemon basedir: {}", state.resolved.basedir.display());
    log::info!("daemon binary: {}", state.resolved.executable.display());

    let app = Router::new()
        .route("/", get(ui_index))
        .route("/app.js", get(ui_app_js))
        .route("/style.css", get(ui_style_css))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout))
        .route("/health", get(health))
        .route("/api/commands", get(api_commands))
        .route("/api/run", post(api_run))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_layer,
        ))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("fedadmin listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// Router-wide fixed-window rate limit. Applies to every route, including
/// login, so credential stuffing is bounded too.
async fn rate_limit_layer(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if !state.limiter.allow(addr.ip()).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("too many requests")),
        )
            .into_response();
    }
    next.run(req).await
}

/// Extract the session cookie value from the Cookie header, if any.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// True when the request carries a valid, unexpired admin session.
fn is_authed(state: &GatewayState, headers: &HeaderMap) -> bool {
    session_cookie(headers)
        .map(|t| state.codec.is_admin_session(&t))
        .unwrap_or(false)
}

/// Set-Cookie value for a fresh session token.
fn session_cookie_header(resolved: &Resolved, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        token,
        resolved.session_ttl.as_secs()
    );
    if resolved.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value that clears the session cookie.
fn clear_cookie_header() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    )
}

fn with_set_cookie(mut res: Response, cookie: String) -> Response {
    if let Ok(value) = cookie.parse() {
        res.headers_mut().insert(header::SET_COOKIE, value);
    }
    res
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg))).into_response()
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("not authenticated")),
    )
        .into_response()
}

/// GET /health: liveness probe, no session required.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// GET /login: inline login page (the UI assets themselves are behind the
/// session check, so this page cannot depend on them).
async fn login_page(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    if is_authed(&state, &headers) {
        return Redirect::to("/").into_response();
    }
    Html(LOGIN_PAGE).into_response()
}

/// POST /login: on success set the session cookie and redirect to the UI.
/// Wrong username and wrong password yield the same generic 401.
async fn login_submit(
    State(state): State<GatewayState>,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.codec.check_login(&form.user, &form.pass) {
        log::warn!("failed login attempt for user {:?}", form.user);
        return (StatusCode::UNAUTHORIZED, Html("Login failed")).into_response();
    }
    let token = state
        .codec
        .issue(&state.resolved.admin_user, state.resolved.session_ttl);
    with_set_cookie(
        Redirect::to("/").into_response(),
        session_cookie_header(&state.resolved, &token),
    )
}

/// GET /logout: clear the cookie; the token itself simply stops being sent.
async fn logout() -> Response {
    with_set_cookie(Redirect::to("/login").into_response(), clear_cookie_header())
}

/// GET /api/commands: the full registry plus resolved paths for display.
async fn api_commands(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    if !is_authed(&state, &headers) {
        return unauthenticated();
    }
    Json(CommandsResponse {
        basedir: state.resolved.basedir.display().to_string(),
        executable_path: state.resolved.executable.display().to_string(),
        commands: state.registry.all().to_vec(),
    })
    .into_response()
}

/// POST /api/run: look the command up (unknown names are rejected before any
/// argument is examined), validate each declared argument in order stopping
/// at the first failure, then hand the assembled argument vector to the
/// supervisor and return its structured result.
async fn api_run(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> Response {
    if !is_authed(&state, &headers) {
        return unauthenticated();
    }
    let Some(spec) = state.registry.get(&req.command) else {
        return bad_request("command not allowed");
    };

    let mut args = Vec::new();
    for arg_spec in &spec.args {
        match validate::validate(arg_spec, req.args.get(arg_spec.name)) {
            Ok(Some(value)) => args.push(value),
            Ok(None) => {}
            Err(e) => return bad_request(e.to_string()),
        }
    }

    let outcome = exec::run(
        &state.resolved.executable,
        spec.name,
        &state.resolved.basedir,
        &args,
        state.resolved.run_timeout,
    )
    .await;
    log::info!(
        "ran {} ({} args): code {:?} signal {:?}",
        spec.name,
        args.len(),
        outcome.code,
        outcome.signal
    );

    let mut argv = vec![
        spec.name.to_string(),
        state.resolved.basedir.display().to_string(),
    ];
    argv.extend(args);

    Json(RunResponse {
        ok: outcome.ok(),
        command: spec.name.to_string(),
        argv,
        code: outcome.code,
        signal: outcome.signal,
        stdout: outcome.stdout,
        stderr: outcome.stderr,
    })
    .into_response()
}

/// Serve a bundled UI asset, gated by the session check. Unauthenticated page
/// requests are redirected to the login form.
fn ui_asset(state: &GatewayState, headers: &HeaderMap, path: &str, content_type: &str) -> Response {
    if !is_authed(state, headers) {
        return Redirect::to("/login").into_response();
    }
    match UI_ASSETS.get_file(path) {
        Some(file) => ([(header::CONTENT_TYPE, content_type)], file.contents()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ui_index(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    ui_asset(&state, &headers, "index.html", "text/html; charset=utf-8")
}

async fn ui_app_js(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    ui_asset(&state, &headers, "app.js", "text/javascript; charset=utf-8")
}

async fn ui_style_css(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    ui_asset(&state, &headers, "style.css", "text/css; charset=utf-8")
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>fedadmin - Login</title>
  <style>
    body{margin:0;font-family:system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial;background:#0b0d10;color:#e7ebf0}
    .wrap{max-width:460px;margin:72px auto;padding:0 16px}
    .card{background:#12161c;border:1px solid #273141;border-radius:14px;padding:16px}
    .label{font-size:12px;color:#9aa6b2;margin:10px 0 6px}
    input{width:100%;padding:10px 12px;border-radius:10px;border:1px solid #273141;background:#0f1319;color:#e7ebf0}
    button{margin-top:14px;width:100%;padding:10px 12px;border-radius:10px;border:1px solid #273141;background:rgba(110,168,254,.18);color:#e7ebf0;cursor:pointer}
    .muted{color:#9aa6b2;font-size:12px;margin-top:10px}
  </style>
</head>
<body>
  <div class="wrap">
    <h1 style="font-size:22px;margin:0 0 12px">fedadmin</h1>
    <div class="card">
      <form method="post" action="/login">
        <div class="label">Username</div>
        <input name="user" autocomplete="username" required />
        <div class="label">Password</div>
        <input name="pass" type="password" autocomplete="current-password" required />
        <button type="submit">Sign in</button>
      </form>
      <div class="muted">Bind this gateway to localhost and expose it only through your own reverse proxy.</div>
    </div>
  </div>
</body>
</html>"#;
