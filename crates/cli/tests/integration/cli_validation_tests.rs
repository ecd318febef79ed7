//! CLI argument validation tests.
//!
//! These tests verify that the CLI properly validates arguments and provides
//! helpful error messages without requiring network access.

use predicates::prelude::*;

use super::helpers::{exa_cmd, ACCOUNT, DEBT_ASSET, DEBT_MARKET};

#[test]
fn test_help_output() {
    exa_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exa"))
        .stdout(predicate::str::contains("installments"))
        .stdout(predicate::str::contains("repay"))
        .stdout(predicate::str::contains("proposals"));
}

#[test]
fn test_invalid_command() {
    exa_cmd()
        .arg("invalid_command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_installments_missing_amount() {
    exa_cmd()
        .args(["installments"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_installments_requires_rpc_url() {
    exa_cmd()
        .args(["installments", "100", "--debt-market", DEBT_MARKET, "--debt-asset", DEBT_ASSET])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rpc-url"));
}

#[test]
fn test_installments_help() {
    exa_cmd()
        .args(["installments", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--count"))
        .stdout(predicate::str::contains("--debt-market"))
        .stdout(predicate::str::contains("EXA_RPC_URL"));
}

#[test]
fn test_proposals_missing_account() {
    exa_cmd()
        .args(["proposals"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_invalid_address() {
    exa_cmd()
        .args([
            "proposals",
            "not_an_address",
            "--rpc-url",
            "http://localhost:8545",
            "--debt-market",
            DEBT_MARKET,
            "--debt-asset",
            DEBT_ASSET,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid address"));
}

#[test]
fn test_invalid_output_format() {
    exa_cmd()
        .args(["proposals", ACCOUNT, "--format", "invalid_format"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_repay_help() {
    exa_cmd()
        .args(["repay", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--from-market"))
        .stdout(predicate::str::contains("--from-token"))
        .stdout(predicate::str::contains("--execute"))
        .stdout(predicate::str::contains("MATURITY"));
}

#[test]
fn test_repay_funding_sources_conflict() {
    exa_cmd()
        .args([
            "repay",
            "1700000000",
            "max",
            "--account",
            ACCOUNT,
            "--from-market",
            DEBT_MARKET,
            "--from-token",
            DEBT_ASSET,
            "--token-decimals",
            "6",
            "--token-price",
            "1",
            "--private-key",
            "0x01",
            "--rpc-url",
            "http://localhost:8545",
            "--debt-market",
            DEBT_MARKET,
            "--debt-asset",
            DEBT_ASSET,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_repay_private_key_is_hidden_in_help() {
    exa_cmd()
        .env("EXA_PRIVATE_KEY", "0xdeadbeefdeadbeef")
        .args(["repay", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deadbeef").not());
}
