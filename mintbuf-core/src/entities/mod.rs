pub mod buffer_state;
pub mod item;
pub mod run;

pub use buffer_state::{BufferState, DecodeError, PendingNft, StateAccount};
pub use item::{CandidateItem, DisplayAsset, InvalidItem, ItemOrigin, RegisteredItem};
pub use run::{ItemError, ItemOutcome, ItemStage, OrchestrationRun, RunPhase, RunReport};
