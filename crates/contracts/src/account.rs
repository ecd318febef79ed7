//! Smart account, plugin, proposal manager and account previewer bindings.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IExaAccount {
        struct Call {
            address target;
            uint256 value;
            bytes data;
        }

        error NotNext();
        error NoProposal();
        error Timelocked();

        function getInstalledPlugins() external view returns (address[] memory);
        function executeBatch(Call[] calldata calls) external payable returns (bytes[] memory);
        function propose(address market, uint256 amount, uint8 proposalType, bytes calldata data) external;
        function executeProposal(uint256 nonce) external;
        function repay(uint256 maturity) external;
        function crossRepay(uint256 maturity, address collateral) external;
    }

    #[sol(rpc)]
    interface IProposalManager {
        function delay() external view returns (uint256);
        function nonces(address account) external view returns (uint256);
        function queueNonces(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IExaPreviewer {
        struct Proposal {
            uint256 amount;
            address market;
            uint256 timestamp;
            uint8 proposalType;
            bytes data;
        }

        struct PendingProposal {
            uint256 nonce;
            Proposal proposal;
            uint256 unlock;
        }

        function pendingProposals(address account) external view returns (PendingProposal[] memory);
    }
}
