//! MockCluster - Spawn fake DHT nodes for integration testing
//!
//! Every node serves `POST /store` and `POST /get` on its own port, from a
//! contiguous, process-unique port range so the harness can sweep it exactly
//! like a real cluster. All nodes share one key/value map: a write to any node
//! is visible to every node, which then answers according to its
//! [`NodeBehavior`].

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;

/// Global counter so parallel tests never share a port range
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

/// Ports reserved per cluster
const PORT_RANGE_PER_CLUSTER: u16 = 40;

/// How a mock node answers
#[derive(Debug, Clone)]
pub enum NodeBehavior {
    /// Resolve stored keys, reporting this many hops
    Resolve { hops: u64 },
    /// Resolve stored keys without a `hop_count` field
    ResolveWithoutHops,
    /// Answer 200 with a stale value
    Stale { hops: u64 },
    /// Answer with this status and a failure body
    Status(u16),
    /// Resolve, but only after a delay
    Slow { delay: Duration, hops: u64 },
    /// Refuse writes with HTTP 500 `success: false`
    RejectStore,
    /// Nothing listens on this node's port
    Down,
    /// Accept and read the request, then close without answering
    HangUp,
    /// Listening, but the accept queue is full so connects never complete
    Blackhole,
}

struct NodeState {
    behavior: NodeBehavior,
    data: Arc<Mutex<HashMap<String, String>>>,
    store_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
}

/// A running set of mock nodes on ports `base_port..base_port + len`
pub struct MockCluster {
    pub base_port: u16,
    behaviors: Vec<NodeBehavior>,
    store_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    tasks: Vec<JoinHandle<()>>,
    blackholes: Vec<(TcpListener, Vec<TcpStream>)>,
}

impl MockCluster {
    /// Spawn one node per behavior
    pub async fn spawn(behaviors: Vec<NodeBehavior>) -> Self {
        assert!(!behaviors.is_empty(), "Need at least 1 node");
        assert!(behaviors.len() <= PORT_RANGE_PER_CLUSTER as usize);

        let (base_port, listeners) = reserve_ports(behaviors.len());

        let data = Arc::new(Mutex::new(HashMap::new()));
        let store_calls = Arc::new(AtomicUsize::new(0));
        let get_calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        let mut blackholes = Vec::new();

        for (behavior, listener) in behaviors.iter().zip(listeners) {
            match behavior {
                // Dropping the listener leaves the port closed
                NodeBehavior::Down => continue,
                NodeBehavior::HangUp => {
                    tasks.push(spawn_hang_up(listener));
                    continue;
                }
                NodeBehavior::Blackhole => {
                    let port = listener.local_addr().expect("local_addr").port();
                    drop(listener);
                    blackholes.push(blackhole(port).await);
                    continue;
                }
                _ => {}
            }

            let state = Arc::new(NodeState {
                behavior: behavior.clone(),
                data: data.clone(),
                store_calls: store_calls.clone(),
                get_calls: get_calls.clone(),
            });
            let app = Router::new()
                .route("/store", post(handle_store))
                .route("/get", post(handle_get))
                .with_state(state);

            listener.set_nonblocking(true).expect("set_nonblocking");
            let listener =
                tokio::net::TcpListener::from_std(listener).expect("tokio listener");

            tasks.push(tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            }));
        }

        Self {
            base_port,
            behaviors,
            store_calls,
            get_calls,
            tasks,
            blackholes,
        }
    }

    pub fn port(&self, index: usize) -> u16 {
        self.base_port + index as u16
    }

    pub fn node_count(&self) -> usize {
        self.behaviors.len()
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockCluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Serve a node that reads each request and closes the connection unanswered
fn spawn_hang_up(listener: StdTcpListener) -> JoinHandle<()> {
    listener.set_nonblocking(true).expect("set_nonblocking");
    let listener = TcpListener::from_std(listener).expect("tokio listener");

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
        }
    })
}

/// Rebind `port` with a zero backlog and fill its accept queue
///
/// The listener never accepts, so once the queue is full further SYNs are
/// dropped and a client's connect attempt hangs until its own timeout.
async fn blackhole(port: u16) -> (TcpListener, Vec<TcpStream>) {
    let socket = TcpSocket::new_v4().expect("socket");
    socket.set_reuseaddr(true).expect("reuseaddr");
    socket
        .bind(([127, 0, 0, 1], port).into())
        .expect("rebind blackhole port");
    let listener = socket.listen(0).expect("listen");

    let mut queued = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(
            Duration::from_millis(200),
            TcpStream::connect(("127.0.0.1", port)),
        )
        .await
        {
            Ok(Ok(stream)) => queued.push(stream),
            Ok(Err(e)) => panic!("filling accept queue on port {}: {}", port, e),
            // Queue is full
            Err(_) => return (listener, queued),
        }
    }
    panic!("accept queue on port {} never filled", port);
}

/// Bind `count` contiguous loopback ports, retrying on the next range if any is taken
fn reserve_ports(count: usize) -> (u16, Vec<StdTcpListener>) {
    for _ in 0..50 {
        let cluster_index = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let cluster_offset = (cluster_index as u32 * PORT_RANGE_PER_CLUSTER as u32) % 20000;
        let base_port = 30000u16
            .wrapping_add((std::process::id() as u16 % 50) * 200)
            .wrapping_add(cluster_offset as u16);

        let listeners: Result<Vec<_>, _> = (0..count)
            .map(|i| StdTcpListener::bind(("127.0.0.1", base_port + i as u16)))
            .collect();

        if let Ok(listeners) = listeners {
            return (base_port, listeners);
        }
    }
    panic!("Could not reserve {} contiguous ports", count);
}

async fn handle_store(
    State(node): State<Arc<NodeState>>,
    Json(req): Json<Value>,
) -> (StatusCode, Json<Value>) {
    node.store_calls.fetch_add(1, Ordering::SeqCst);

    if matches!(node.behavior, NodeBehavior::RejectStore) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": "Failed to store: no peers"})),
        );
    }

    let (Some(key), Some(value)) = (req["key"].as_str(), req["value"].as_str()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Key and value are required"})),
        );
    };

    node.data.lock().insert(key.to_string(), value.to_string());
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Successfully stored in DHT",
            "key_hash": format!("mock-{}", key),
        })),
    )
}

async fn handle_get(
    State(node): State<Arc<NodeState>>,
    Json(req): Json<Value>,
) -> (StatusCode, Json<Value>) {
    node.get_calls.fetch_add(1, Ordering::SeqCst);

    let key = req["key"].as_str().unwrap_or_default().to_string();
    let stored = node.data.lock().get(&key).cloned();

    let hops = match &node.behavior {
        NodeBehavior::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(json!({"success": false, "message": "mock failure"})));
        }
        NodeBehavior::Stale { hops } => {
            return (
                StatusCode::OK,
                Json(json!({"success": true, "value": "stale", "hop_count": hops})),
            );
        }
        NodeBehavior::Slow { delay, hops } => {
            tokio::time::sleep(*delay).await;
            Some(*hops)
        }
        NodeBehavior::Resolve { hops } => Some(*hops),
        NodeBehavior::ResolveWithoutHops | NodeBehavior::RejectStore => None,
        NodeBehavior::Down | NodeBehavior::HangUp | NodeBehavior::Blackhole => {
            unreachable!("node has no HTTP server")
        }
    };

    match (stored, hops) {
        (None, _) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "Key not found", "hop_count": 3})),
        ),
        (Some(value), Some(hops)) => (
            StatusCode::OK,
            Json(json!({"success": true, "value": value, "hop_count": hops})),
        ),
        (Some(value), None) => (
            StatusCode::OK,
            Json(json!({"success": true, "value": value})),
        ),
    }
}
