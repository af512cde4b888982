pub mod channel;
pub mod config;
pub mod intent;
pub mod interest;
pub mod orchestration;
pub mod runtime;
pub mod shared;
pub mod storage;
pub mod workflow;
