//! 核心层：数据模型、渲染状态、激活协调器、错误类型

pub mod coordinator;
pub mod error;
pub mod state;
pub mod types;

pub use coordinator::{activation_prompt, ActivationPlan, Coordinator, GenerationToken, ResponseRoute};
pub use error::{ProtocolError, QuintError, RelayError};
pub use state::RenderState;
pub use types::{
    Block, BlockId, Choice, ChoiceId, ChoiceSnapshot, Directionality, JsonObject, RenderItem,
    Reveal, RevealId,
};
