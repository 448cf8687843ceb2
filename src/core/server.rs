/// MCP Server Transports
///
/// This module contains the network-facing side of the server:
/// - HTTP server setup with Actix Web (Streamable HTTP on `/mcp`, liveness on `/health`)
/// - STDIO server for line-delimited JSON-RPC
/// - Shared JSON-RPC method routing used by both transports

use actix_web::{
    http::header,
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use bytes::Bytes;
use futures_util::stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, info, warn};

use crate::core::config::ServerConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::identity::{self, IdentityContext, IDENTITY_HEADERS};
use crate::core::protocol::{
    self, CallToolParams, McpError, McpRequest, McpResponse, RejectedRequest,
};
use crate::core::session::{SessionError, SessionGuard, SessionState, SessionStore};
use crate::core::timestamp;

/// Header carrying the Streamable HTTP session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC error code used with HTTP 404 for unknown sessions.
const SESSION_NOT_FOUND: i32 = -32001;

/// Application state shared by every transport and worker.
///
/// Everything here is either immutable after startup or internally locked,
/// so it is shared through a single `Arc`.
pub struct AppState {
    /// Server name as reported in `initialize` and `/health`
    pub server_name: String,
    /// Server version string as reported in `initialize`
    pub server_version: String,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: &ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            server_name: config.server_name.clone(),
            server_version: config.server_version.clone(),
            dispatcher: Arc::new(dispatcher),
            sessions: SessionStore::new(config.session_idle_ttl),
        }
    }
}

/// Route one JSON-RPC request to its method handler.
///
/// `session` is the guard of the session the request belongs to, if any; it is
/// advanced to `Dispatching` for tool calls. The caller moves it to
/// `Responding` once the response exists.
pub async fn handle_request(
    state: &AppState,
    request: McpRequest,
    identity: Option<IdentityContext>,
    session: Option<&SessionGuard>,
) -> McpResponse {
    let McpRequest { id, method, params, .. } = request;

    match method.as_str() {
        "initialize" => McpResponse::success(
            id,
            json!({
                "protocolVersion": protocol::negotiate_protocol_version(params.as_ref()),
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": state.server_name,
                    "version": state.server_version
                }
            }),
        ),
        "ping" => McpResponse::success(id, json!({})),
        "tools/list" => McpResponse::success(
            id,
            json!({ "tools": state.dispatcher.list_tools() }),
        ),
        "tools/call" => {
            let call = match CallToolParams::from_params(params.as_ref()) {
                Ok(call) => call,
                Err(e) => {
                    warn!(error = %e, "rejected tools/call");
                    return McpResponse::error(id, McpError::from(&e));
                }
            };

            if let Some(guard) = session {
                guard.advance(SessionState::Dispatching);
            }
            info!(
                tool = %call.name,
                identity = identity.is_some(),
                "tools/call"
            );
            let result = state
                .dispatcher
                .call_tool(&call.name, call.arguments, identity)
                .await;
            debug!(tool = %call.name, success = result.is_success(), "tools/call finished");
            protocol::tool_result_response(id, result)
        }
        _ => {
            debug!(method = %method, "method not found");
            McpResponse::error(id, McpError::method_not_found(&method))
        }
    }
}

/// Collect the identity-bearing headers into a lower-cased metadata map.
///
/// Values are decoded as UTF-8, with invalid bytes replaced, so a header the
/// gateway sent is never dropped.
pub fn metadata_from_headers(headers: &header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().to_ascii_lowercase();
            if !IDENTITY_HEADERS.contains(&key.as_str()) {
                return None;
            }
            Some((key, String::from_utf8_lossy(value.as_bytes()).into_owned()))
        })
        .collect()
}

/// Health check endpoint handler.
///
/// Reads only immutable state, so it never waits on sessions or tool calls.
async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": state.server_name,
        "timestamp": timestamp()
    }))
}

/// Streamable HTTP message endpoint (`POST /mcp`).
async fn mcp_post(req: HttpRequest, state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request = match protocol::parse_request(&body) {
        Ok(request) => request,
        Err(RejectedRequest { id, error }) => {
            warn!(error = %error, "rejected JSON-RPC envelope");
            return HttpResponse::BadRequest().json(McpResponse::error(id, McpError::from(&error)));
        }
    };

    let session = if request.method == "initialize" && !request.is_notification() {
        Some(state.sessions.create())
    } else {
        match session_id(&req) {
            Some(id) => match state.sessions.get(id) {
                Ok(session) => Some(session),
                Err(e) => return session_not_found(request.id, &e),
            },
            None => None,
        }
    };

    if request.is_notification() {
        debug!(method = %request.method, "notification acknowledged");
        return HttpResponse::Accepted().finish();
    }

    let guard = match &session {
        Some(session) => match session.begin().await {
            Ok(guard) => Some(guard),
            Err(e) => return session_not_found(request.id, &e),
        },
        None => None,
    };

    let identity = identity::extract(&metadata_from_headers(req.headers()));
    let response = handle_request(&state, request, identity, guard.as_ref()).await;

    if let Some(guard) = &guard {
        guard.advance(SessionState::Responding);
    }

    let body = match serde_json::to_string(&response) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut builder = HttpResponse::Ok();
    if let Some(session) = &session {
        builder.insert_header((SESSION_HEADER, session.id().to_string()));
    }

    if accepts_event_stream(&req) {
        event_stream(builder, body)
    } else {
        builder.content_type("application/json").body(body)
    }
}

/// Session termination (`DELETE /mcp`).
async fn mcp_delete(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let Some(id) = session_id(&req) else {
        return HttpResponse::BadRequest().json(McpResponse::error(
            None,
            McpError::new(protocol::INVALID_REQUEST, "missing Mcp-Session-Id header"),
        ));
    };

    match state.sessions.close(id) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => session_not_found(None, &e),
    }
}

/// Server-initiated streams are not offered (`GET /mcp`).
async fn mcp_get() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST, DELETE"))
        .finish()
}

fn session_id(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
}

fn session_not_found(id: Option<Value>, err: &SessionError) -> HttpResponse {
    debug!(error = %err, "session lookup failed");
    HttpResponse::NotFound().json(McpResponse::error(
        id,
        McpError::new(SESSION_NOT_FOUND, "Session not found"),
    ))
}

fn accepts_event_stream(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// Frame a single JSON-RPC response as a one-event SSE stream.
fn event_stream(mut builder: actix_web::HttpResponseBuilder, body: String) -> HttpResponse {
    let frame = Bytes::from(format!("event: message\ndata: {body}\n\n"));
    builder
        .content_type("text/event-stream")
        // Disable caching so intermediaries never replay a response
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
        ]))
        // Compression would buffer the stream
        .insert_header(header::ContentEncoding::Identity)
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .streaming(stream::once(async move { Ok::<_, Infallible>(frame) }))
}

/// Register all HTTP routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::resource("/mcp")
                .route(web::post().to(mcp_post))
                .route(web::get().to(mcp_get))
                .route(web::delete().to(mcp_delete)),
        )
        .route("/", web::post().to(mcp_post))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// # Configuration
/// - Worker threads: from config (CPU count capped at 16 by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(config: &ServerConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let state = web::Data::from(state);

    info!(
        name = %state.server_name,
        version = %state.server_version,
        bind = %bind_addr,
        workers = config.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            // Add security headers to all responses
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(config.workers)
    // Connection limits for high-traffic scenarios
    .max_connections(10000)
    .max_connection_rate(1000)
    // Timeout configurations to prevent resource exhaustion
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    // Graceful shutdown timeout
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Requests are read one line at a time and answered in order, which makes
/// the whole stream a single serialized session. No identity headers exist
/// here, so tool calls always see an anonymous caller.
pub async fn run_server_stdio(state: Arc<AppState>) -> std::io::Result<()> {
    info!(
        name = %state.server_name,
        version = %state.server_version,
        "MCP server starting (STDIO mode)"
    );

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(&state, stdin, stdout).await
}

/// Line-delimited JSON-RPC loop behind the STDIO transport.
pub async fn serve_lines<R, W>(state: &AppState, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match protocol::parse_request(line.as_bytes()) {
            Ok(request) if request.is_notification() => {
                debug!(method = %request.method, "notification received");
                continue;
            }
            Ok(request) => handle_request(state, request, None, None).await,
            Err(RejectedRequest { id, error }) => {
                warn!(error = %error, "rejected JSON-RPC line");
                McpResponse::error(id, McpError::from(&error))
            }
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        // Each response must be on a single line followed by newline
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    info!("STDIO input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::{DispatcherBuilder, ToolOutput};
    use crate::core::registry::ToolDescriptor;
    use crate::tools::initialize_tools;
    use actix_web::{http::StatusCode, test};
    use futures_util::future::{select, Either};

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::from_lookup(|_| None).unwrap();
        config.server_version = "0.0.0-test".to_string();
        config
    }

    fn demo_state(surface_identity: bool) -> web::Data<AppState> {
        let mut config = test_config();
        config.surface_identity = surface_identity;
        let dispatcher = initialize_tools(&config).unwrap();
        web::Data::new(AppState::new(&config, dispatcher))
    }

    fn rpc(body: Value) -> test::TestRequest {
        test::TestRequest::post().uri("/mcp").set_json(body)
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[actix_rt::test]
    async fn health_reports_healthy() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "mcp-oauth-demo");
        assert!(body["timestamp"].is_string());
    }

    #[actix_rt::test]
    async fn tools_list_is_ordered_and_stable() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;
        let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

        let first: Value = test::call_and_read_body_json(&app, rpc(list.clone()).to_request()).await;
        let second: Value = test::call_and_read_body_json(&app, rpc(list).to_request()).await;
        assert_eq!(first, second);

        let tools = first["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["message"]));
    }

    #[actix_rt::test]
    async fn echo_call_returns_text_content() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let body: Value =
            test::call_and_read_body_json(&app, rpc(call(2, "echo", json!({"message": "hi"}))).to_request()).await;
        assert_eq!(body["id"], 2);
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(body["result"]["content"], json!([{"type": "text", "text": "Echo: hi"}]));
    }

    #[actix_rt::test]
    async fn unknown_tool_is_reported_not_crashed() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let body: Value =
            test::call_and_read_body_json(&app, rpc(call(3, "nope", json!({}))).to_request()).await;
        assert_eq!(body["error"]["code"], protocol::INVALID_PARAMS);
        assert_eq!(body["error"]["message"], "Unknown tool: nope");

        // Still serving afterwards.
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn handler_error_is_an_error_result() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let body: Value =
            test::call_and_read_body_json(&app, rpc(call(4, "delete_file", json!({}))).to_request()).await;
        assert_eq!(body["result"]["isError"], true);
        assert_eq!(
            body["result"]["content"][0]["text"],
            "Error: Missing required parameter: filename"
        );
    }

    #[actix_rt::test]
    async fn malformed_envelopes_are_rejected() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"jsonrpc\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], protocol::PARSE_ERROR);
        assert_eq!(body["id"], Value::Null);

        let body: Value = test::call_and_read_body_json(
            &app,
            rpc(json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call"})).to_request(),
        )
        .await;
        assert_eq!(body["error"]["code"], protocol::INVALID_PARAMS);

        let body: Value = test::call_and_read_body_json(
            &app,
            rpc(json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"})).to_request(),
        )
        .await;
        assert_eq!(body["error"]["code"], protocol::METHOD_NOT_FOUND);
    }

    #[actix_rt::test]
    async fn notifications_are_accepted_without_body() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let req = rpc(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(test::read_body(resp).await.is_empty());
    }

    #[actix_rt::test]
    async fn session_lifecycle() {
        let state = demo_state(false);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let init = rpc(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        }))
        .to_request();
        let resp = test::call_service(&app, init).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(body["result"]["serverInfo"]["name"], "mcp-oauth-demo");

        let session = state.sessions.get(&session_id).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        let req = rpc(call(2, "echo", json!({"message": "again"})))
            .insert_header((SESSION_HEADER, session_id.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(SESSION_HEADER).unwrap(), session_id.as_str());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"]["content"][0]["text"], "Echo: again");
        assert_eq!(session.state(), SessionState::Idle);

        let req = test::TestRequest::delete()
            .uri("/mcp")
            .insert_header((SESSION_HEADER, session_id.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert_eq!(session.state(), SessionState::Closed);

        let req = rpc(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}))
            .insert_header((SESSION_HEADER, session_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn unknown_session_is_not_found() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let req = rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .insert_header((SESSION_HEADER, "no-such-session"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::delete()
            .uri("/mcp")
            .insert_header((SESSION_HEADER, "no-such-session"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn get_on_mcp_is_not_allowed() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/mcp").to_request()).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_rt::test]
    async fn event_stream_framing() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let req = rpc(call(9, "echo", json!({"message": "sse"})))
            .insert_header((header::ACCEPT, "application/json, text/event-stream"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        let data = text
            .strip_prefix("event: message\ndata: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let message: Value = serde_json::from_str(data).unwrap();
        assert_eq!(message["result"]["content"][0]["text"], "Echo: sse");
    }

    #[actix_rt::test]
    async fn gateway_identity_reaches_tools_without_token() {
        let app = test::init_service(App::new().app_data(demo_state(true)).configure(configure)).await;

        let req = rpc(call(1, "get_user_info", json!({})))
            .insert_header(("X-JWT-Claim-Sub", "user-42"))
            .insert_header(("X-JWT-Claim-Email", "u42@example.com"))
            .insert_header((header::AUTHORIZATION, "Bearer secret-token"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(!text.contains("secret-token"));
        let info: Value = serde_json::from_str(text).unwrap();
        assert_eq!(info["identity"]["subject"], "user-42");
        assert_eq!(info["identity"]["email"], "u42@example.com");
        assert_eq!(info["identity"]["hasBearerToken"], true);
    }

    #[actix_rt::test]
    async fn header_metadata_is_filtered_and_lowercased() {
        let req = test::TestRequest::default()
            .insert_header(("X-Forwarded-User", "alice"))
            .insert_header(("Cookie", "session=abc"))
            .to_http_request();

        let metadata = metadata_from_headers(req.headers());
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("x-forwarded-user").map(String::as_str), Some("alice"));
    }

    #[actix_rt::test]
    async fn non_ascii_identity_headers_are_kept() {
        let req = test::TestRequest::default()
            .insert_header((
                header::AUTHORIZATION,
                header::HeaderValue::from_bytes("Bearer tök".as_bytes()).unwrap(),
            ))
            .insert_header((
                "X-JWT-Claim-Preferred-Username",
                header::HeaderValue::from_bytes("José".as_bytes()).unwrap(),
            ))
            .to_http_request();

        let identity = identity::extract(&metadata_from_headers(req.headers())).unwrap();
        assert!(identity.has_bearer_token);
        assert_eq!(identity.preferred_username.as_deref(), Some("José"));
    }

    #[actix_rt::test]
    async fn null_id_is_a_request_not_a_notification() {
        let app = test::init_service(App::new().app_data(demo_state(false)).configure(configure)).await;

        let req = rpc(json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["result"], json!({}));
    }

    #[actix_rt::test]
    async fn health_is_independent_of_in_flight_calls() {
        let mut builder = DispatcherBuilder::new();
        builder
            .tool(
                ToolDescriptor::new("slow", "Sleeps", json!({"type": "object"})),
                |_, _| {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(ToolOutput::Text("done".to_string()))
                },
            )
            .unwrap();
        let state = web::Data::new(AppState::new(&test_config(), builder.build(Duration::from_secs(5))));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let slow = test::call_service(&app, rpc(call(1, "slow", json!({}))).to_request());
        let health = test::call_service(&app, test::TestRequest::get().uri("/health").to_request());
        futures_util::pin_mut!(slow);
        futures_util::pin_mut!(health);

        match select(slow, health).await {
            Either::Right((resp, slow)) => {
                let body: Value = test::read_body_json(resp).await;
                assert_eq!(body["status"], "healthy");

                let body: Value = test::read_body_json(slow.await).await;
                assert_eq!(body["result"]["content"][0]["text"], "done");
            }
            Either::Left(_) => panic!("health check waited for the tool call"),
        }
    }

    #[tokio::test]
    async fn stdio_loop_answers_requests_in_order() {
        let state = demo_state(false);
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"echo\",\"arguments\":{\"message\":\"hi\"}}}\n",
            "not json\n",
        );
        let mut output = Vec::new();

        serve_lines(&state, input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = std::str::from_utf8(&output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "mcp-oauth-demo");
        assert_eq!(responses[1]["result"]["content"][0]["text"], "Echo: hi");
        assert_eq!(responses[2]["error"]["code"], protocol::PARSE_ERROR);
    }
}
