//! Solidity surface of the oracle contract used by the recovery tool.

use alloy::sol;

sol! {
    /// Emitted by the oracle for every request-creation
    #[derive(Debug, PartialEq, Eq)]
    event OracleRequest(
        bytes32 indexed specId,
        address requester,
        bytes32 requestId,
        uint256 payment,
        address callbackAddr,
        bytes4 callbackFunctionId,
        uint256 cancelExpiration,
        uint256 dataVersion,
        bytes data
    );

    #[derive(Debug, PartialEq, Eq)]
    function fulfillOracleRequest(
        bytes32 _requestId,
        uint256 _payment,
        address _callbackAddress,
        bytes4 _callbackFunctionId,
        uint256 _expiration,
        bytes32 _data
    ) external returns (bool);
}
