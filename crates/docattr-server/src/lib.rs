//! HTTP server for docattr.
//!
//! Accepts document updates for attribution, serves merged attribute maps,
//! stores full snapshots and returns the deltas between them.

pub mod admission;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use admission::AdmissionConfig;
pub use config::{ServerConfig, StoreBackend, StoreConfig};
pub use error::{ServerError, ServerResult};
pub use server::DocattrServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use docattr_core::{Pipeline, PipelineConfig};
    use docattr_doc::{AttributeMap, Document, Identifier};
    use docattr_store::{InMemoryBlobStore, KeyScheme};
    use serde_json::Value;
    use tower::util::ServiceExt;

    fn app_with(admission: AdmissionConfig, max_body_bytes: usize) -> (Router, Pipeline) {
        let pipeline = Pipeline::new(
            Arc::new(InMemoryBlobStore::new()),
            KeyScheme::new(),
            PipelineConfig::default(),
        );
        let router = router::build_router(AppState::new(pipeline.clone(), admission), max_body_bytes);
        (router, pipeline)
    }

    fn app() -> (Router, Pipeline) {
        app_with(AdmissionConfig::default(), 16 * 1024 * 1024)
    }

    fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn hello_update() -> Vec<u8> {
        let mut d = Document::new(3);
        d.insert(0, "hello").unwrap().encode().unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["queued"], 0);
    }

    #[tokio::test]
    async fn attribute_then_read_back() {
        let (app, pipeline) = app();
        let response = app
            .clone()
            .oneshot(post(
                "/attribute/doc1?user=alice&timestamp=1000&session=s1",
                hello_update(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
        assert_eq!(pipeline.cache().queue_len(), 1);

        let response = app.oneshot(get("/attributions/doc1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        let map = AttributeMap::decode(&body_bytes(response).await).unwrap();
        let items = map.attributions(&Identifier::new(3, 4)).unwrap();
        assert!(items.iter().any(|i| i.name == "insert" && i.value == "alice"));
        assert!(items.iter().any(|i| i.name == "insertAt" && i.value == "1000"));
        assert!(items.iter().any(|i| i.name == "_session" && i.value == "s1"));
    }

    #[tokio::test]
    async fn attribute_rejects_bad_requests() {
        let (app, pipeline) = app();
        let cases = [
            ("/attribute/doc1?user=alice", Vec::new()),
            ("/attribute/doc1", hello_update()),
            ("/attribute/doc1?user=a&timestamp=abc", hello_update()),
            ("/attribute/doc1?user=a", b"not an update".to_vec()),
            ("/attribute/bad%3Aid?user=a", hello_update()),
        ];
        for (uri, body) in cases {
            let response = app.clone().oneshot(post(uri, body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let json = body_json(response).await;
            assert_eq!(json["error"]["status"], 400);
        }
        assert!(pipeline.cache().is_idle());
    }

    #[tokio::test]
    async fn admission_control_rejects_with_503() {
        let tight = AdmissionConfig {
            memory_budget_bytes: 1_000,
            headroom_factor: 100,
        };
        let (app, pipeline) = app_with(tight, 1024);
        let response = app
            .oneshot(post("/attribute/doc1?user=a", hello_update()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"]["code"], "overloaded");
        assert!(pipeline.cache().is_idle());
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let (app, _) = app_with(AdmissionConfig::default(), 16);
        let response = app
            .oneshot(post("/version/doc1", vec![0u8; 64]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn versions_and_deltas() {
        let (app, _) = app();
        let mut d = Document::new(1);
        d.insert(0, "ab").unwrap();
        let first = d.encode_state().unwrap();
        d.insert(2, "c").unwrap();
        let second = d.encode_state().unwrap();

        for snapshot in [first, second] {
            let response = app
                .clone()
                .oneshot(post("/version/doc1", snapshot))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(get("/version-deltas/doc1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let deltas = json["deltas"].as_array().unwrap();
        assert_eq!(deltas.len(), 2);
        assert!(deltas[0]["timestamp"].as_u64().unwrap() < deltas[1]["timestamp"].as_u64().unwrap());
        assert_eq!(deltas[0]["delta"], serde_json::json!([{ "insert": "ab" }]));
        assert_eq!(
            deltas[1]["delta"],
            serde_json::json!([{ "retain": 2 }, { "insert": "c" }])
        );
    }

    #[tokio::test]
    async fn version_rejects_empty_and_malformed() {
        let (app, _) = app();
        for body in [Vec::new(), b"junk".to_vec()] {
            let response = app
                .clone()
                .oneshot(post("/version/doc1", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn unknown_document_reads_are_empty() {
        let (app, _) = app();
        let response = app
            .clone()
            .oneshot(get("/attributions/nobody"))
            .await
            .unwrap();
        let map = AttributeMap::decode(&body_bytes(response).await).unwrap();
        assert!(map.is_empty());

        let response = app.oneshot(get("/version-deltas/nobody")).await.unwrap();
        assert_eq!(body_json(response).await["deltas"], serde_json::json!([]));
    }
}
