//! Wire types shared between the replenisher and its collaborators.

pub mod generator;
pub mod ipfs;
pub mod pool;
pub mod rpc;
pub mod status;

pub use generator::TransformRequest;
pub use ipfs::{IpfsAddResponse, MetadataAttribute, MetadataFile, MetadataProperties, NftMetadataDocument};
pub use pool::{ApprovedNft, NftId, NftStatus, NftStatusUpdate};
pub use rpc::{
    AccountNotification, Commitment, JsonRpcError, LatestBlockhash, RpcContext, RpcResponse,
    SignatureStatus, UiAccount,
};
pub use status::{BufferSnapshot, RunSummary, StatusResponse};
