//! Reward strategies and the pipeline that combines them.
//!
//! A step's reward is additive: the process strategy scores every step,
//! the result strategy only scores the step that ends the trajectory.

pub mod pipeline;
pub mod process;
pub mod result;

pub use pipeline::RewardPipeline;
pub use process::{ProcessRewardStrategy, ToolCallReward, ToolPolicy};
pub use result::{
    JudgeReward, MatchingReward, MathMatchingReward, ResultRewardStrategy, extract_final_response,
    label_text,
};
