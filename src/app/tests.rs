use super::*;
use crate::config::{CameraBackend, WastebinConfig};
use crate::error::{StreamError, WastebinError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn create_test_config() -> WastebinConfig {
    let mut config = WastebinConfig::default();
    config.camera.backend = CameraBackend::TestPattern;
    config.classifier.model_path = String::new();
    config.stream.ip = "127.0.0.1".to_string();
    config.stream.port = 0;
    config
}

/// Minimal HTTP/1.1 GET returning the raw response text
async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let orchestrator = WastebinOrchestrator::new(create_test_config()).unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert!(states.is_empty());
    assert!(orchestrator.local_addr().is_none());
    assert!(!orchestrator.context().is_started());
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let mut orchestrator = WastebinOrchestrator::new(create_test_config()).unwrap();

    orchestrator.initialize().await.unwrap();

    for component in ["streaming", "pipeline", "event_relay"] {
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(ComponentState::Stopped)
        );
    }
}

#[tokio::test]
async fn test_start_serves_and_starts_pipeline_lazily() {
    let mut orchestrator = WastebinOrchestrator::new(create_test_config()).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let addr = orchestrator.local_addr().unwrap();
    let ctx = orchestrator.context();
    assert!(!ctx.is_started());
    assert_eq!(
        orchestrator.get_component_state("streaming").await,
        Some(ComponentState::Running)
    );

    let response = http_get(addr, "/ml-status").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"time_until_next_scan\""));
    assert!(ctx.is_started());

    let mut pipeline_state = None;
    for _ in 0..50 {
        pipeline_state = orchestrator.get_component_state("pipeline").await;
        if pipeline_state == Some(ComponentState::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(pipeline_state, Some(ComponentState::Running));

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(
        orchestrator.get_component_state("pipeline").await,
        Some(ComponentState::Stopped)
    );
    assert!(!ctx.classification.is_running());
}

#[tokio::test]
async fn test_eager_start() {
    let mut config = create_test_config();
    config.system.eager_start = true;
    let mut orchestrator = WastebinOrchestrator::new(config).unwrap();
    orchestrator.initialize().await.unwrap();

    orchestrator.start().await.unwrap();

    let ctx = orchestrator.context();
    assert!(ctx.is_started());
    assert!(ctx.readiness.wait(Duration::from_secs(2)).await);
    assert_eq!(
        orchestrator.get_component_state("pipeline").await,
        Some(ComponentState::Running)
    );

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
    assert!(!ctx.camera_status.is_available());
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = create_test_config();
    config.stream.port = occupied.local_addr().unwrap().port();
    let mut orchestrator = WastebinOrchestrator::new(config).unwrap();
    orchestrator.initialize().await.unwrap();

    let result = orchestrator.start().await;

    assert!(matches!(
        result,
        Err(WastebinError::Stream(StreamError::BindFailed { .. }))
    ));
    assert_eq!(
        orchestrator.get_component_state("streaming").await,
        Some(ComponentState::Failed)
    );
}

#[tokio::test]
async fn test_run_returns_on_shutdown_request() {
    let mut orchestrator = WastebinOrchestrator::new(create_test_config()).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    let shutdown = orchestrator.shutdown_handle();

    let run = tokio::spawn(async move { orchestrator.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(shutdown.request(ShutdownReason::UserRequest).await);
    assert!(!shutdown.request(ShutdownReason::UserRequest).await);

    let exit_code = tokio::time::timeout(Duration::from_secs(15), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
}

#[tokio::test]
async fn test_open_stream_does_not_block_shutdown() {
    let mut orchestrator = WastebinOrchestrator::new(create_test_config()).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    let addr = orchestrator.local_addr().unwrap();

    let mut viewer = TcpStream::connect(addr).await.unwrap();
    viewer
        .write_all(b"GET /video_feed HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    let mut head = [0u8; 64];
    let read = viewer.read(&mut head).await.unwrap();
    assert!(String::from_utf8_lossy(&head[..read]).starts_with("HTTP/1.1 200"));

    let exit_code = tokio::time::timeout(Duration::from_secs(10), orchestrator.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
}
