//! JSON-RPC reader tests against a mock node.

mod helpers;

use exa_credit_api::{ApiError, ChainReader, RpcChainReader};
use exa_credit_contracts::provider::connect_read_only;
use helpers::*;
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers every `eth_call` with one ABI word, echoing the request id.
struct EthCallResponder {
    word: String,
}

impl Respond for EthCallResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["method"], "eth_call");
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": self.word,
        }))
    }
}

struct RpcErrorResponder;

impl Respond for RpcErrorResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": { "code": -32000, "message": "execution reverted" },
        }))
    }
}

fn reader(server: &MockServer) -> RpcChainReader {
    RpcChainReader::new(connect_read_only(&server.uri()).unwrap(), settlement_config())
}

#[tokio::test]
async fn test_read_proposal_delay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EthCallResponder {
            word: format!("0x{:064x}", 3_600u64),
        })
        .mount(&server)
        .await;

    let delay = reader(&server).read_proposal_delay().await.unwrap();
    assert_eq!(delay, 3_600);
}

#[tokio::test]
async fn test_read_proposal_delay_failure_is_not_defaulted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(RpcErrorResponder)
        .mount(&server)
        .await;

    let result = reader(&server).read_proposal_delay().await;
    assert!(matches!(result, Err(ApiError::SnapshotUnavailable(_))));
}
