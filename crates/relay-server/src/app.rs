use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use relay_api::{ApiHandler, HttpApi};
use relay_prometheus::PrometheusMetrics;

/// HTTP API routes plus `GET /metrics` and `GET /healthz`.
pub fn router<H: ApiHandler>(handler: Arc<H>, metrics: PrometheusMetrics) -> Router {
    let ops = Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .with_state(metrics);

    HttpApi::new(handler).router().merge(ops)
}

async fn serve_metrics(State(metrics): State<PrometheusMetrics>) -> Response {
    match metrics.encode_text() {
        Ok((body, content_type)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use std::time::Duration;

    use axum::{Json, routing::post};
    use relay_api::TaskServiceAdapter;
    use relay_core::service::TaskService;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::delivery::WebhookDelivery;

    fn app() -> Router {
        let metrics = PrometheusMetrics::new().unwrap();
        let service = TaskService::builder()
            .with_metrics(Arc::new(metrics.clone()))
            .build();
        router(Arc::new(TaskServiceAdapter::new(Arc::new(service))), metrics)
    }

    async fn send_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
        let res = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), 1 << 20).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn rejected_submissions_show_up_in_metrics() {
        let app = app();
        let submit = Request::post("/api/v1/accounts/acc/tasks")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"taskType":"shell","runnerTag":"linux"}"#))
            .unwrap();
        let res = app.clone().oneshot(submit).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = get_text(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"relay_submissions_rejected_total{reason="no_eligible_worker"} 1"#));
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (status, _) = get_text(&app(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn registered_callback_receives_the_result() {
        let (tx, mut rx) = mpsc::channel::<Value>(4);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let receiver = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body).await;
                    StatusCode::NO_CONTENT
                }
            }),
        );
        tokio::spawn(async move { axum::serve(listener, receiver).await });

        let metrics = PrometheusMetrics::new().unwrap();
        let delivery = WebhookDelivery::new(Duration::from_secs(5)).unwrap();
        let service = TaskService::builder()
            .with_metrics(Arc::new(metrics.clone()))
            .with_delivery(Arc::new(delivery))
            .build();
        let app = router(Arc::new(TaskServiceAdapter::new(Arc::new(service))), metrics);

        let (_, body) = send_json(&app, "/api/v1/callbacks", json!({ "target": format!("http://{addr}/hook") })).await;
        let token = body["callbackToken"].as_str().unwrap().to_string();
        let (status, _) = send_json(
            &app,
            "/api/v1/accounts/acc/workers",
            json!({ "workerId": "w-1", "selectors": ["linux"], "taskTypes": ["shell"] }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send_json(
            &app,
            "/api/v1/accounts/acc/tasks",
            json!({ "taskType": "shell", "runnerTag": "linux", "callbackToken": token }),
        )
        .await;
        let id = body["taskId"].as_str().unwrap().to_string();
        send_json(&app, "/api/v1/accounts/acc/workers/w-1/poll", json!({})).await;
        send_json(&app, &format!("/api/v1/accounts/acc/tasks/{id}/acquire"), json!({ "workerId": "w-1" })).await;
        let (status, _) = send_json(
            &app,
            &format!("/api/v1/accounts/acc/tasks/{id}/status"),
            json!({ "outcome": "success", "payload": { "format": "binary", "data": "AAE=" } }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("callback not delivered in time")
            .unwrap();
        assert_eq!(delivered["kind"], "result");
        assert_eq!(delivered["taskId"], id.as_str());
        assert_eq!(delivered["callbackToken"], token.as_str());
        assert_eq!(delivered["result"]["payload"]["data"], "AAE=");
    }
}
