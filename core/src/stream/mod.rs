mod flow;
mod framing;
mod sharded;
mod tcp;

pub use flow::{FlowKey, TcpSegment, TcpStreamBytes};
pub use sharded::{shard_index_for, ShardedTcpAssembler};
pub use tcp::{FlowState, TcpAssembler};
