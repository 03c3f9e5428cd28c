//! Upstream block source seam.

use futures::future::BoxFuture;
use serde_json::Value;

use flow_data::rpc::RpcClient;

/// Where the service gets blocks it has not cached yet.
pub trait BlockSource: Send + Sync {
    /// Raw `eth_getBlockByNumber` result, or `None` if the block is unknown.
    fn block(&self, block_number: u64) -> BoxFuture<'_, eyre::Result<Option<Value>>>;
}

impl BlockSource for RpcClient {
    fn block(&self, block_number: u64) -> BoxFuture<'_, eyre::Result<Option<Value>>> {
        Box::pin(self.fetch_block(block_number))
    }
}
