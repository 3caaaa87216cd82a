//! Stand-in CNS server for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use hnswrap_ipam::cns::{
    CnsResponse, IpConfigResponse, IpConfiguration, IpSubnet, PodIpInfo, RELEASE_IP_CONFIG_PATH,
    REQUEST_IP_CONFIG_PATH,
};
use hnswrap_ipam::IpConfigRequest;

/// How the fake CNS answers.
#[derive(Clone)]
pub enum Behavior {
    /// Allocate `10.240.0.7/16` via `10.240.0.1`.
    Allocate,
    /// Answer with a CNS return code.
    ReturnCode(i32),
    /// Answer with an HTTP 500.
    ServerError,
    /// Sleep before answering.
    Stall(Duration),
}

#[derive(Clone)]
struct FakeCns {
    behavior: Behavior,
    requests: Arc<Mutex<Vec<IpConfigRequest>>>,
}

/// A running fake CNS.
pub struct CnsServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<IpConfigRequest>>>,
}

impl CnsServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<IpConfigRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn allocation() -> IpConfigResponse {
    IpConfigResponse {
        pod_ip_info: PodIpInfo {
            pod_ip_config: IpSubnet {
                ip_address: "10.240.0.7".to_string(),
                prefix_length: 32,
            },
            network_container_primary_ip_config: IpConfiguration {
                ip_subnet: IpSubnet {
                    ip_address: "10.240.0.0".to_string(),
                    prefix_length: 16,
                },
                dns_servers: vec!["168.63.129.16".to_string()],
                gateway_ip_address: "10.240.0.1".to_string(),
            },
            ..Default::default()
        },
        response: CnsResponse::default(),
    }
}

async fn request_ip(
    State(cns): State<FakeCns>,
    Json(request): Json<IpConfigRequest>,
) -> Result<Json<IpConfigResponse>, StatusCode> {
    cns.requests.lock().unwrap().push(request);
    match cns.behavior {
        Behavior::Allocate => Ok(Json(allocation())),
        Behavior::ReturnCode(code) => Ok(Json(IpConfigResponse {
            response: CnsResponse {
                return_code: code,
                message: "rejected".to_string(),
            },
            ..Default::default()
        })),
        Behavior::ServerError => Err(StatusCode::INTERNAL_SERVER_ERROR),
        Behavior::Stall(delay) => {
            tokio::time::sleep(delay).await;
            Ok(Json(allocation()))
        }
    }
}

async fn release_ip(
    State(cns): State<FakeCns>,
    Json(request): Json<IpConfigRequest>,
) -> Result<Json<CnsResponse>, StatusCode> {
    cns.requests.lock().unwrap().push(request);
    match cns.behavior {
        Behavior::ReturnCode(code) => Ok(Json(CnsResponse {
            return_code: code,
            message: "rejected".to_string(),
        })),
        Behavior::ServerError => Err(StatusCode::INTERNAL_SERVER_ERROR),
        Behavior::Allocate | Behavior::Stall(_) => Ok(Json(CnsResponse::default())),
    }
}

/// Start a fake CNS on an ephemeral port.
pub async fn spawn_cns(behavior: Behavior) -> CnsServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(REQUEST_IP_CONFIG_PATH, post(request_ip))
        .route(RELEASE_IP_CONFIG_PATH, post(release_ip))
        .with_state(FakeCns {
            behavior,
            requests: Arc::clone(&requests),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    CnsServer { addr, requests }
}
