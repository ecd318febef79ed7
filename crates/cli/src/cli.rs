//! CLI argument definitions using clap.

use std::str::FromStr;

use alloy_primitives::Address;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Exa CLI - Fixed-rate credit installments, repayments and proposals
#[derive(Parser, Debug)]
#[command(name = "exa")]
#[command(about = "CLI tool for fixed-rate credit installments, repayments and proposals", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show installment options for borrowing an amount now
    Installments(InstallmentsArgs),
    /// Plan, simulate and optionally execute a fixed-rate repayment
    Repay(RepayArgs),
    /// List pending proposals of an account
    Proposals(ProposalsArgs),
}

/// Where to read the chain and which deployment to use.
#[derive(Args, Debug, Clone)]
pub struct DeploymentArgs {
    /// RPC URL (can also use EXA_RPC_URL env var)
    #[arg(long, env = "EXA_RPC_URL")]
    pub rpc_url: String,

    /// Market holding the fixed-rate debt
    #[arg(long, env = "EXA_DEBT_MARKET")]
    pub debt_market: AddressArg,

    /// Underlying asset of the debt market
    #[arg(long, env = "EXA_DEBT_ASSET")]
    pub debt_asset: AddressArg,

    /// Latest account plugin
    #[arg(long, env = "EXA_PLUGIN")]
    pub plugin: Option<AddressArg>,

    /// Proposal manager
    #[arg(long, env = "EXA_PROPOSAL_MANAGER")]
    pub proposal_manager: Option<AddressArg>,

    /// Account previewer
    #[arg(long, env = "EXA_PREVIEWER")]
    pub previewer: Option<AddressArg>,

    /// Market previewer
    #[arg(long, env = "EXA_MARKET_PREVIEWER")]
    pub market_previewer: Option<AddressArg>,

    /// Auditor used for prices
    #[arg(long, env = "EXA_AUDITOR")]
    pub auditor: Option<AddressArg>,

    /// Flash-loan reservoir capping repayments
    #[arg(long, env = "EXA_RESERVOIR")]
    pub reservoir: Option<AddressArg>,

    /// Seconds a ready proposal stays executable
    #[arg(long, env = "EXA_PROPOSAL_EXPIRY", default_value = "86400")]
    pub proposal_expiry: u64,
}

#[derive(Parser, Debug)]
pub struct InstallmentsArgs {
    /// Amount to borrow in human-readable units (e.g., "1000.5")
    pub amount: String,

    /// Only show this number of installments
    #[arg(long, short = 'c')]
    pub count: Option<usize>,

    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

#[derive(Parser, Debug)]
pub struct RepayArgs {
    /// Maturity (unix seconds) of the position to repay
    pub maturity: u64,

    /// Position assets to repay in human-readable units, or "max"
    pub amount: String,

    /// Account holding the position (can also use EXA_ACCOUNT env var)
    #[arg(long, env = "EXA_ACCOUNT")]
    pub account: AddressArg,

    /// Fund the repayment from the account's deposit in this market
    #[arg(long, conflicts_with = "from_token")]
    pub from_market: Option<AddressArg>,

    /// Fund the repayment from a token held by the account
    #[arg(long, requires_all = ["token_decimals", "token_price"])]
    pub from_token: Option<AddressArg>,

    /// Decimals of --from-token
    #[arg(long)]
    pub token_decimals: Option<u8>,

    /// USD price of --from-token in human-readable units
    #[arg(long)]
    pub token_price: Option<String>,

    /// Submit the transaction after a successful simulation
    #[arg(long)]
    pub execute: bool,

    /// Seconds to wait for each router quote
    #[arg(long, default_value = "30")]
    pub quote_timeout: u64,

    /// Private key of the account owner (can also use EXA_PRIVATE_KEY env var)
    #[arg(long, env = "EXA_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Swap router API URL (can also use EXA_ROUTER_URL env var)
    #[arg(long, env = "EXA_ROUTER_URL")]
    pub router_url: Option<String>,

    /// Swap router API key (can also use EXA_ROUTER_API_KEY env var)
    #[arg(long, env = "EXA_ROUTER_API_KEY", hide_env_values = true)]
    pub router_api_key: Option<String>,

    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

#[derive(Parser, Debug)]
pub struct ProposalsArgs {
    /// Account to list proposals for
    pub account: AddressArg,

    #[command(flatten)]
    pub deployment: DeploymentArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Address parsed from hex, with or without checksum.
#[derive(Clone, Copy, Debug)]
pub struct AddressArg(pub Address);

impl FromStr for AddressArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Address>()
            .map(AddressArg)
            .map_err(|_| format!("Invalid address: {}", s))
    }
}

impl std::fmt::Display for AddressArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
