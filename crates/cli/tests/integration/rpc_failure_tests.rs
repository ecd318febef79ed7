//! Commands fail cleanly when the RPC endpoint errors.

use predicates::prelude::*;

use super::helpers::{exa_cmd_with_rpc, start_failing_rpc, ACCOUNT};

#[tokio::test]
async fn test_installments_rpc_failure() {
    let server = start_failing_rpc().await;

    exa_cmd_with_rpc(&server)
        .args(["installments", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[tokio::test]
async fn test_proposals_rpc_failure() {
    let server = start_failing_rpc().await;

    exa_cmd_with_rpc(&server)
        .args(["proposals", ACCOUNT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[tokio::test]
async fn test_repay_without_plugin_is_config_error() {
    let server = start_failing_rpc().await;

    exa_cmd_with_rpc(&server)
        .args([
            "repay",
            "1700000000",
            "max",
            "--account",
            ACCOUNT,
            "--private-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("address is not set"));
}
