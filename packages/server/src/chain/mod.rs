pub mod rpc;
pub mod token;

pub use rpc::RpcClient;
pub use token::{ChainClient, ReceiptStatus};
