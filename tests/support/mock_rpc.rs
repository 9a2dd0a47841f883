use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use anyhow::{Context, Result};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const GENESIS_TIME: u64 = 1_700_000_000;

/// In-memory chain served over Bitcoin Core's verbose JSON-RPC shapes.
///
/// Every block holds one transaction with a taproot output (vout 0), an
/// `OP_RETURN` carrier (vout 1), and a p2wpkh payment (vout 2).
#[derive(Clone)]
pub struct MockChain {
    tip: Arc<AtomicU64>,
    faults: Arc<RwLock<Faults>>,
    calls: Arc<RwLock<HashMap<String, usize>>>,
    chain_info_failures: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Faults {
    failing_heights: HashSet<u64>,
    misreported_heights: HashMap<u64, u64>,
}

impl MockChain {
    pub fn with_tip(tip: u64) -> Self {
        Self {
            tip: Arc::new(AtomicU64::new(tip)),
            faults: Arc::new(RwLock::new(Faults::default())),
            calls: Arc::new(RwLock::new(HashMap::new())),
            chain_info_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn tip(&self) -> u64 {
        self.tip.load(Ordering::SeqCst)
    }

    pub fn set_tip(&self, tip: u64) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    pub fn advance_tip_by(&self, delta: u64) -> u64 {
        self.tip.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// `getblock` for `height` answers with an internal error until healed.
    pub fn fail_height(&self, height: u64) {
        self.faults
            .write()
            .expect("mock faults poisoned")
            .failing_heights
            .insert(height);
    }

    pub fn heal_height(&self, height: u64) {
        self.faults
            .write()
            .expect("mock faults poisoned")
            .failing_heights
            .remove(&height);
    }

    /// The block served for `requested` reports `reported` as its height.
    pub fn misreport_height(&self, requested: u64, reported: u64) {
        self.faults
            .write()
            .expect("mock faults poisoned")
            .misreported_heights
            .insert(requested, reported);
    }

    /// The next `times` calls to `getblockchaininfo` fail.
    pub fn fail_chain_info(&self, times: usize) {
        self.chain_info_failures.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .read()
            .expect("mock call log poisoned")
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn record_call(&self, method: &str) {
        *self
            .calls
            .write()
            .expect("mock call log poisoned")
            .entry(method.to_owned())
            .or_default() += 1;
    }

    fn take_chain_info_failure(&self) -> bool {
        self.chain_info_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn height_for_hash(&self, hash: &str) -> Option<u64> {
        let tip = self.tip();
        (0..=tip)
            .rev()
            .find(|height| block_hash(*height).to_string() == hash)
    }

    fn verbose_block(&self, height: u64) -> Value {
        let faults = self.faults.read().expect("mock faults poisoned");
        let reported = faults
            .misreported_heights
            .get(&height)
            .copied()
            .unwrap_or(height);

        json!({
            "hash": block_hash(height).to_string(),
            "height": reported,
            "time": GENESIS_TIME + height,
            "tx": [{
                "txid": txid(height, 0).to_string(),
                "vout": [
                    {
                        "value": 0.00000546,
                        "n": 0,
                        "scriptPubKey": {
                            "asm": "1 5be5e2b0c7a1",
                            "type": "witness_v1_taproot",
                            "address": format!("tb1p-mock-{height}"),
                        }
                    },
                    {
                        "value": 0.0,
                        "n": 1,
                        "scriptPubKey": {
                            "asm": "OP_RETURN 6f7264",
                            "type": "nulldata",
                        }
                    },
                    {
                        "value": 0.0001,
                        "n": 2,
                        "scriptPubKey": {
                            "asm": "0 14ab",
                            "type": "witness_v0_keyhash",
                            "address": format!("tb1q-mock-{height}"),
                        }
                    }
                ]
            }]
        })
    }
}

pub fn block_hash(height: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_le_bytes());
    bytes[31] = 0xb1;
    BlockHash::from_slice(&bytes).expect("valid block hash bytes")
}

pub fn txid(height: u64, position: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_le_bytes());
    bytes[30] = position;
    bytes[31] = 0x7e;
    Txid::from_slice(&bytes).expect("valid txid bytes")
}

pub struct MockNode {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockNode {
    pub async fn start(chain: MockChain) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock RPC listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let chain = chain.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| serve_request(chain.clone(), req))) }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock node stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(chain: MockChain, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("failed to read body: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("invalid JSON payload: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let response_value = handle_call(&chain, payload);

    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn handle_call(chain: &MockChain, call: Value) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = call
        .get("params")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    chain.record_call(&method);

    match method.as_str() {
        "getblockchaininfo" => {
            if chain.take_chain_info_failure() {
                return error(id, -28, "Loading block index...");
            }
            let tip = chain.tip();
            success(
                id,
                json!({
                    "chain": "signet",
                    "blocks": tip,
                    "headers": tip,
                    "bestblockhash": block_hash(tip).to_string(),
                    "verificationprogress": 1.0,
                    "size_on_disk": 1_048_576,
                }),
            )
        }
        "getblockhash" => {
            let height = params
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(Value::as_u64);
            match height.filter(|h| *h <= chain.tip()) {
                Some(height) => success(id, Value::String(block_hash(height).to_string())),
                None => error(id, -8, "Block height out of range"),
            }
        }
        "getblock" => {
            let hash = params
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(Value::as_str)
                .map(|value| value.to_string());
            let Some(height) = hash.and_then(|h| chain.height_for_hash(&h)) else {
                return error(id, -5, "Block not found");
            };
            let failing = chain
                .faults
                .read()
                .expect("mock faults poisoned")
                .failing_heights
                .contains(&height);
            if failing {
                error(id, -1, format!("block {height} temporarily unavailable"))
            } else {
                success(id, chain.verbose_block(height))
            }
        }
        _ => error(id, -32601, format!("unknown method {method}")),
    }
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": id,
    })
}
