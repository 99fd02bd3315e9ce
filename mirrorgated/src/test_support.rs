use std::net::SocketAddr;
use std::time::Duration;
use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;
use shared::types::{InstanceGroup, ServiceDefinition};

/// Serve `app` on an ephemeral local port
pub async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

/// Upstream answering every request with `status`
pub async fn spawn_status(status: StatusCode) -> SocketAddr {
    spawn_upstream(Router::new().fallback(move || async move { status })).await
}

/// Upstream that accepts connections and never answers
pub async fn spawn_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Address nothing listens on
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    // give the OS a moment to release the port
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

pub fn url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

pub fn service(service_type: &str, instances: &[String]) -> ServiceDefinition {
    ServiceDefinition {
        service_type: service_type.to_string(),
        test_path: "/search?q=test".to_string(),
        fallback_url: String::new(),
        instance_groups: instances
            .iter()
            .map(|i| InstanceGroup::parse(i).unwrap())
            .collect(),
    }
}
