//! `EthRpcClient` against a local axum JSON-RPC responder.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ethereum_types::H256;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::error::RpcError;
use crate::orchestrator::{AnalysisConfig, BlockAnalyzer};
use crate::rpc_client::{EthRpcClient, RpcConfig, response_nesting_limit};
use crate::severity::SuspicionType;
use crate::source::BlockSource;
use crate::types::UnanalyzedReason;

type Route = Arc<dyn Fn(&Value, usize) -> Response + Send + Sync>;

#[derive(Clone)]
struct Responder {
    route: Route,
    served: Arc<AtomicUsize>,
}

async fn handle_rpc(State(responder): State<Responder>, Json(request): Json<Value>) -> Response {
    let index = responder.served.fetch_add(1, Ordering::SeqCst);
    (responder.route)(&request, index)
}

/// Serve JSON-RPC on an ephemeral port until the test ends.
///
/// `route` receives the decoded request body and the zero-based request
/// index. The returned counter tracks requests served.
async fn serve<F>(route: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(&Value, usize) -> Response + Send + Sync + 'static,
{
    let served = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/", post(handle_rpc))
        .with_state(Responder {
            route: Arc::new(route),
            served: served.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (url, served)
}

fn ok(result: Value) -> Response {
    raw_ok(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
}

fn raw_ok(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn fast_config(max_retries: u32) -> RpcConfig {
    RpcConfig {
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        max_retries,
        base_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

/// `callTracer` response with `levels` frames nested under the root, each
/// calling 0xcc again with the same selector.
fn nested_trace_response(levels: usize) -> String {
    let mut frame = r#"{"to":"0x00000000000000000000000000000000000000bb","input":"0xaaaaaaaa"}"#.to_string();
    for _ in 0..levels {
        frame = format!(
            r#"{{"to":"0x00000000000000000000000000000000000000cc","input":"0xbbbbbbbb","calls":[{frame}]}}"#
        );
    }
    format!(r#"{{"jsonrpc":"2.0","id":1,"result":{frame}}}"#)
}

#[tokio::test]
async fn block_number_is_decoded_from_hex() {
    let (url, _) = serve(|req, _| {
        assert_eq!(req["method"], "eth_blockNumber");
        ok(json!("0x1b4"))
    })
    .await;
    let client = EthRpcClient::with_config(&url, fast_config(0));
    assert_eq!(client.latest_block_number().await.unwrap(), 436);
}

#[tokio::test]
async fn block_request_asks_for_full_transactions() {
    let (url, _) = serve(|req, _| {
        assert_eq!(req["method"], "eth_getBlockByNumber");
        assert_eq!(req["params"], json!(["0x10", true]));
        ok(json!({
            "number": "0x10",
            "hash": format!("0x{}", "11".repeat(32)),
            "gasUsed": "0x5208",
            "transactions": [
                { "hash": format!("0x{}", "01".repeat(32)), "input": "0x", "value": "0x1" },
                { "hash": format!("0x{}", "02".repeat(32)), "input": "0xa9059cbb0000" }
            ]
        }))
    })
    .await;
    let client = EthRpcClient::with_config(&url, fast_config(0));

    let block = client.block_by_number(16).await.unwrap();
    assert_eq!(block.number, 16);
    assert_eq!(block.transactions.len(), 2);
    assert!(block.transactions[0].input.is_empty());
    assert_eq!(
        block.transactions[1].input.as_ref(),
        &[0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x00]
    );
}

#[tokio::test]
async fn null_block_is_not_found() {
    let (url, _) = serve(|_, _| ok(Value::Null)).await;
    let client = EthRpcClient::with_config(&url, fast_config(0));
    let err = client.block_by_number(99).await.unwrap_err();
    assert!(matches!(err, RpcError::NotFound { .. }));
}

#[tokio::test]
async fn json_rpc_error_is_not_retried() {
    let (url, count) = serve(|_, _| {
        raw_ok(
            json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "method not found" } })
                .to_string(),
        )
    })
    .await;
    let client = EthRpcClient::with_config(&url, fast_config(3));

    let err = client
        .debug_trace_transaction(H256::from_low_u64_be(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::JsonRpcError { code: -32601, .. }));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_status_is_retried_until_success() {
    let (url, count) = serve(|_, index| {
        if index < 2 {
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response()
        } else {
            ok(json!("0x2a"))
        }
    })
    .await;
    let client = EthRpcClient::with_config(&url, fast_config(3));

    assert_eq!(client.eth_block_number().await.unwrap(), 42);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_exhaust_after_configured_attempts() {
    let (url, count) =
        serve(|_, _| (StatusCode::BAD_GATEWAY, "bad gateway").into_response()).await;
    let client = EthRpcClient::with_config(&url, fast_config(2));

    let err = client.eth_block_number().await.unwrap_err();
    match err {
        RpcError::RetryExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, RpcError::HttpError { status: 502, .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rate_limit_waits_for_retry_after_not_backoff() {
    let (url, count) = serve(|_, index| {
        if index == 0 {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "0")],
                "slow down",
            )
                .into_response()
        } else {
            ok(json!("0x7"))
        }
    })
    .await;
    let config = RpcConfig {
        base_backoff: Duration::from_secs(30),
        ..fast_config(1)
    };
    let client = EthRpcClient::with_config(&url, config);

    let number = tokio::time::timeout(Duration::from_secs(5), client.eth_block_number())
        .await
        .expect("Retry-After: 0 should override the 30s backoff");
    assert_eq!(number.unwrap(), 7);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn trace_request_uses_call_tracer() {
    let (url, _) = serve(|req, _| {
        assert_eq!(req["method"], "debug_traceTransaction");
        assert_eq!(req["params"][0], format!("0x{}", "00".repeat(31) + "07"));
        assert_eq!(req["params"][1], json!({ "tracer": "callTracer" }));
        ok(json!({ "type": "CALL", "from": "0x01", "to": null, "calls": null }))
    })
    .await;
    let client = EthRpcClient::with_config(&url, fast_config(0));

    let frame = client
        .debug_trace_transaction(H256::from_low_u64_be(7))
        .await
        .unwrap();
    assert!(frame.calls.is_empty());
}

#[tokio::test]
async fn block_analysis_over_http() {
    let b = "0x00000000000000000000000000000000000000bb";
    let (url, _) = serve(move |req, _| {
        let tx = req["params"][0].as_str().unwrap_or_default();
        if tx.ends_with("01") {
            ok(json!({
                "to": "0x00000000000000000000000000000000000000aa",
                "input": "0x",
                "calls": [{
                    "to": b,
                    "input": "0xaaaaaaaa",
                    "calls": [{ "to": b, "input": "0xaaaaaaaa00" }]
                }]
            }))
        } else {
            ok(json!({ "to": b, "input": "0xaaaaaaaa" }))
        }
    })
    .await;
    let client = Arc::new(EthRpcClient::with_config(&url, fast_config(0)));
    let block = super::helpers::block(
        5,
        vec![
            super::helpers::tx(1, &super::helpers::SEL_A),
            super::helpers::tx(2, &super::helpers::SEL_B),
        ],
    );

    let report = BlockAnalyzer::new(client, AnalysisConfig::default())
        .analyze_block(&block)
        .await;
    assert_eq!(report.selected, 2);
    assert_eq!(report.suspects.len(), 1);
    assert_eq!(report.suspects[0].tx_hash, H256::from_low_u64_be(1));
    assert_eq!(report.suspects[0].suspicion, SuspicionType::Hard);
    assert!(report.unanalyzed.is_empty());
}

#[tokio::test]
async fn deep_trace_over_http_is_analyzed_with_default_limits() {
    let (url, _) = serve(|_, _| raw_ok(nested_trace_response(300))).await;
    let client = Arc::new(EthRpcClient::with_config(&url, fast_config(0)));
    let block = super::helpers::block(6, vec![super::helpers::tx(1, &super::helpers::SEL_A)]);

    let report = BlockAnalyzer::new(client, AnalysisConfig::default())
        .analyze_block(&block)
        .await;
    assert!(report.unanalyzed.is_empty(), "{:?}", report.unanalyzed);
    assert_eq!(report.suspects.len(), 1);
    assert_eq!(report.suspects[0].suspicion, SuspicionType::Hard);
}

#[tokio::test]
async fn trace_beyond_depth_bound_over_http_is_too_deep() {
    let (url, _) = serve(|_, _| raw_ok(nested_trace_response(300))).await;
    let rpc_config = RpcConfig {
        max_response_nesting: response_nesting_limit(100),
        ..fast_config(0)
    };
    let client = Arc::new(EthRpcClient::with_config(&url, rpc_config));
    let block = super::helpers::block(6, vec![super::helpers::tx(1, &super::helpers::SEL_A)]);
    let config = AnalysisConfig {
        max_depth: 100,
        ..Default::default()
    };

    let report = BlockAnalyzer::new(client, config).analyze_block(&block).await;
    assert!(report.suspects.is_empty());
    assert_eq!(report.unanalyzed.len(), 1);
    assert_eq!(
        report.unanalyzed[0].reason,
        UnanalyzedReason::TraceTooDeep { max_depth: 100 }
    );
}
