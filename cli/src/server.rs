#[cfg(feature = "server")]
pub mod http {
    use axum::{
        body::Bytes,
        extract::State,
        http::{header, HeaderMap, Method, StatusCode, Uri},
        response::{IntoResponse, Json, Response},
        routing::get,
        Router,
    };
    use glyph::routing::RouteMatch;
    use glyph::{GlyphError, HttpMethod, Interpreter, Request, RuntimeError, Value};
    use serde::Serialize;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower_http::cors::CorsLayer;
    use tracing::{error, info};

    /// The interpreter is not `Send`, so handlers share only the module path and
    /// load a fresh interpreter per request
    #[derive(Debug)]
    pub struct AppState {
        pub file: PathBuf,
    }

    #[derive(Debug, Serialize)]
    struct ErrorResponse {
        error: String,
    }

    /// Result of running one request against the module
    #[derive(Debug)]
    enum Outcome {
        Ok(serde_json::Value),
        NotFound,
        MethodNotAllowed(Vec<HttpMethod>),
        Unauthorized,
        Failed(StatusCode, String),
    }

    pub async fn start_server(file: PathBuf, host: &str, port: u16) -> anyhow::Result<()> {
        let app = router(Arc::new(AppState { file }));

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        info!("Glyph server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .fallback(dispatch)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    async fn health_check() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "ok",
            "service": "glyph",
            "version": env!("CARGO_PKG_VERSION")
        }))
    }

    async fn dispatch(
        State(state): State<Arc<AppState>>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let Some(method) = HttpMethod::parse(method.as_str()) else {
            return error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("unsupported method {}", method),
            );
        };
        let path = uri.path().to_string();
        let query = uri.query().unwrap_or_default().to_string();

        let body = if body.is_empty() {
            None
        } else {
            match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(json) => Some(json),
                Err(e) => {
                    return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {}", e))
                }
            }
        };
        let headers: Vec<(String, String)> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let file = state.file.clone();
        let task = tokio::task::spawn_blocking(move || {
            run_request(&file, method, &path, &query, body, headers)
        });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Request task failed: {}", e);
                Outcome::Failed(StatusCode::INTERNAL_SERVER_ERROR, "request task failed".into())
            }
        };

        match outcome {
            Outcome::Ok(json) => (StatusCode::OK, Json(json)).into_response(),
            Outcome::NotFound => error_response(StatusCode::NOT_FOUND, format!("no route for {}", uri.path())),
            Outcome::MethodNotAllowed(allowed) => {
                let allow: Vec<&str> = allowed.iter().map(HttpMethod::as_str).collect();
                let mut response = error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    format!("{} is not allowed on {}", method, uri.path()),
                );
                if let Ok(value) = allow.join(", ").parse() {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
            Outcome::Unauthorized => {
                error_response(StatusCode::UNAUTHORIZED, "authentication required".to_string())
            }
            Outcome::Failed(status, message) => error_response(status, message),
        }
    }

    fn error_response(status: StatusCode, error: String) -> Response {
        (status, Json(ErrorResponse { error })).into_response()
    }

    fn run_request(
        file: &std::path::Path,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: Option<serde_json::Value>,
        headers: Vec<(String, String)>,
    ) -> Outcome {
        let mut interpreter = Interpreter::new();
        if let Err(e) = interpreter.load_file(file) {
            error!("Failed to load {}: {}", file.display(), e);
            return Outcome::Failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }

        let (key, params) = match interpreter.match_route(method, path) {
            RouteMatch::Found { key, params } => (key, params),
            RouteMatch::MethodNotAllowed { allowed } => return Outcome::MethodNotAllowed(allowed),
            RouteMatch::NotFound => return Outcome::NotFound,
        };
        let Some(route) = interpreter.registry().routes.get(&key) else {
            return Outcome::NotFound;
        };

        let mut request = Request::new().with_query_string(query);
        let mut token = None;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("authorization") {
                token = Some(value.strip_prefix("Bearer ").unwrap_or(&value).to_string());
            }
            request = request.with_header(name, value);
        }
        if let Some(json) = &body {
            request = request.with_body(Value::from_json(json));
        }
        match (&route.auth, token) {
            (Some(auth), None) if auth.required => return Outcome::Unauthorized,
            (_, Some(token)) => {
                request = request.with_auth(Value::object([("token", Value::string(token))]));
            }
            _ => {}
        }

        match interpreter.execute_route(route, &params, &request) {
            Ok(value) => {
                info!("{} {} -> {}", method, path, key);
                Outcome::Ok(value.to_json())
            }
            Err(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!("{} {} failed: {}", method, path, e);
                }
                Outcome::Failed(status, e.to_string())
            }
        }
    }

    /// Bad input is the caller's fault; everything else is ours
    fn status_for(error: &GlyphError) -> StatusCode {
        match error.as_runtime() {
            Some(
                RuntimeError::TypeMismatch(_)
                | RuntimeError::MissingRequiredParam(_)
                | RuntimeError::ValidationFailed(_),
            ) => StatusCode::BAD_REQUEST,
            Some(RuntimeError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use axum::body::Body;
        use axum::http::Request as HttpRequest;
        use std::io::Write;
        use tower::ServiceExt;

        const TODOS: &str = r#"
: Todo { id: int!, title: string! }

@ GET /todos/:id -> Todo {
  > {id: parseInt(id), title: "write docs"}
}

@ POST /todos -> Todo {
  < body: object
  > {id: 2, title: body.title}
}

@ GET /me {
  + auth(jwt)
  > auth
}
"#;

        fn app() -> (Router, tempfile::NamedTempFile) {
            app_for(TODOS)
        }

        fn app_for(source: &str) -> (Router, tempfile::NamedTempFile) {
            let mut file = tempfile::Builder::new().suffix(".glyph").tempfile().unwrap();
            file.write_all(source.as_bytes()).unwrap();
            let state = Arc::new(AppState {
                file: file.path().to_path_buf(),
            });
            (router(state), file)
        }

        async fn send(app: Router, request: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
            let response = app.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        #[tokio::test]
        async fn test_health() {
            let (app, _file) = app();
            let request = HttpRequest::get("/health").body(Body::empty()).unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["status"], "ok");
        }

        #[tokio::test]
        async fn test_get_with_path_param() {
            let (app, _file) = app();
            let request = HttpRequest::get("/todos/7").body(Body::empty()).unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json, serde_json::json!({"id": 7, "title": "write docs"}));
        }

        #[tokio::test]
        async fn test_post_body() {
            let (app, _file) = app();
            let request = HttpRequest::post("/todos")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"title": "ship"}"#))
                .unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["title"], "ship");
        }

        #[tokio::test]
        async fn test_unknown_route_and_method() {
            let (app, _file) = app();
            let request = HttpRequest::get("/nope").body(Body::empty()).unwrap();
            let (status, _) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::NOT_FOUND);

            let request = HttpRequest::delete("/todos/1").body(Body::empty()).unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert!(json["error"].as_str().unwrap().contains("DELETE"));
        }

        #[tokio::test]
        async fn test_auth_required() {
            let (app, _file) = app();
            let request = HttpRequest::get("/me").body(Body::empty()).unwrap();
            let (status, _) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);

            let request = HttpRequest::get("/me")
                .header("authorization", "Bearer abc")
                .body(Body::empty())
                .unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json, serde_json::json!({"token": "abc"}));
        }

        #[tokio::test]
        async fn test_runaway_recursion_is_a_server_error() {
            let (app, _file) = app_for(
                "func down(n) {\n  > down(n + 1)\n}\n\n@ GET /deep {\n  > down(0)\n}\n",
            );
            let request = HttpRequest::get("/deep").body(Body::empty()).unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(json["error"].as_str().unwrap().contains("max_call_depth"));
        }

        #[tokio::test]
        async fn test_invalid_json_body() {
            let (app, _file) = app();
            let request = HttpRequest::post("/todos")
                .body(Body::from("{not json"))
                .unwrap();
            let (status, json) = send(app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(json["error"].as_str().unwrap().starts_with("invalid JSON body"));
        }
    }
}

#[cfg(not(feature = "server"))]
pub mod http {
    pub async fn start_server(
        _file: std::path::PathBuf,
        _host: &str,
        _port: u16,
    ) -> anyhow::Result<()> {
        anyhow::bail!("Server feature not enabled. Recompile with --features server")
    }
}
