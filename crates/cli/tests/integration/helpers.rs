//! Test helper utilities for CLI integration tests.

use assert_cmd::Command;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEBT_MARKET: &str = "0x0000000000000000000000000000000000000010";
pub const DEBT_ASSET: &str = "0x0000000000000000000000000000000000000011";
pub const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

const ENV_VARS: [&str; 14] = [
    "EXA_RPC_URL",
    "EXA_PRIVATE_KEY",
    "EXA_ACCOUNT",
    "EXA_ROUTER_URL",
    "EXA_ROUTER_API_KEY",
    "EXA_DEBT_MARKET",
    "EXA_DEBT_ASSET",
    "EXA_PLUGIN",
    "EXA_PROPOSAL_MANAGER",
    "EXA_PREVIEWER",
    "EXA_MARKET_PREVIEWER",
    "EXA_AUDITOR",
    "EXA_RESERVOIR",
    "EXA_PROPOSAL_EXPIRY",
];

/// Create a CLI command isolated from the caller's EXA_* environment.
pub fn exa_cmd() -> Command {
    let mut cmd = Command::cargo_bin("exa").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Create a CLI command with the deployment pointing at a mock RPC.
pub fn exa_cmd_with_rpc(mock: &MockServer) -> Command {
    let mut cmd = exa_cmd();
    cmd.env("EXA_RPC_URL", mock.uri())
        .env("EXA_DEBT_MARKET", DEBT_MARKET)
        .env("EXA_DEBT_ASSET", DEBT_ASSET);
    cmd
}

/// Start a mock RPC server that fails every request.
pub async fn start_failing_rpc() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("node unavailable"))
        .mount(&server)
        .await;
    server
}
