//! HttpTransport against a mock server.
//!
//! Uses wiremock for HTTP mocking.

use offcache_core::{
    AssetManifest, Engine, EngineConfig, HttpTransport, Identifier, MemoryRegistry,
    ResourceRequest, Response, ResponseSource, Transport, TransportError, Url, VersionStore,
    Worker,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_returns_status_headers_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>shell</html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let url = Url::parse(&format!("{}/index.html", mock_server.uri())).unwrap();
    let response = transport.fetch(&ResourceRequest::get(url)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "<html>shell</html>");
    assert_eq!(response.header("Content-Type"), Some("text/html"));
}

#[tokio::test]
async fn test_error_status_is_a_response_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let url = Url::parse(&format!("{}/gone", mock_server.uri())).unwrap();
    let response = transport.fetch(&ResourceRequest::get(url)).await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_request_headers_are_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().unwrap();
    let url = Url::parse(&format!("{}/data.json", mock_server.uri())).unwrap();
    let request = ResourceRequest::get(url).with_header("accept", "application/json");
    let response = transport.fetch(&request).await.unwrap();
    assert_eq!(response.status, 200);
}

/// Base URL of a local port nothing is listening on.
fn closed_origin() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap()
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let url = closed_origin().join("index.html").unwrap();

    let transport = HttpTransport::new().unwrap();
    let result = transport.fetch(&ResourceRequest::get(url)).await;
    assert!(matches!(result, Err(TransportError::Network { .. })));
}

#[tokio::test]
async fn test_install_over_http_then_serve_from_store() {
    let mock_server = MockServer::start().await;

    for (route, body) in [("/index.html", "<html>app</html>"), ("/app.js", "main()")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let origin = Url::parse(&mock_server.uri()).unwrap();
    let config = EngineConfig::new(origin.clone(), "1")
        .unwrap()
        .with_manifest(AssetManifest::new(
            ["./index.html", "./app.js"],
            Vec::<String>::new(),
        ));
    let worker = Worker::new(Engine::new(
        config,
        MemoryRegistry::new(),
        HttpTransport::new().unwrap(),
    ));
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    // Served from the store: each route is hit exactly once, by the install
    for _ in 0..3 {
        let app_js = worker
            .fetch(&ResourceRequest::get(origin.join("app.js").unwrap()))
            .await;
        assert_eq!(app_js.source(), Some(ResponseSource::Store));
        assert_eq!(app_js.response().unwrap().body, b"main()");
    }
}

#[tokio::test]
async fn test_unreachable_origin_serves_fallback_document() {
    let origin = closed_origin();
    let config = EngineConfig::new(origin.clone(), "1").unwrap();
    let engine = Engine::new(config, MemoryRegistry::new(), HttpTransport::new().unwrap());
    engine
        .current_store()
        .await
        .unwrap()
        .put(Response::new(200, "<html>app</html>").into_stored(Identifier::new("/index.html")))
        .await
        .unwrap();

    let deep_link = engine
        .handle(&ResourceRequest::get(origin.join("settings/profile").unwrap()))
        .await;
    assert_eq!(deep_link.source(), Some(ResponseSource::Fallback));
    assert_eq!(deep_link.response().unwrap().body, b"<html>app</html>");
}
