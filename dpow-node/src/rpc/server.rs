use jsonrpsee::server::{ServerBuilder, ServerHandle};

use super::handlers::{DpowRpcImpl, DpowRpcServer};
use crate::error::NodeError;

/// Start the JSON-RPC HTTP+WS server. Returns the bound address with the
/// handle, so port 0 can be used.
pub async fn start_rpc_server(
    addr: &str,
    rpc_impl: DpowRpcImpl,
) -> Result<(ServerHandle, std::net::SocketAddr), NodeError> {
    let server = ServerBuilder::default()
        .build(addr)
        .await
        .map_err(|e| NodeError::RpcError {
            reason: format!("failed to build RPC server: {}", e),
        })?;
    let local_addr = server.local_addr().map_err(|e| NodeError::RpcError {
        reason: format!("failed to read RPC server address: {}", e),
    })?;

    let handle = server.start(rpc_impl.into_rpc());

    tracing::info!(addr = %local_addr, "RPC server started");

    Ok((handle, local_addr))
}
