//! Tasksync engine: network and timer side effects for the sync core.
//!
//! Pulls go through [`TaskApi`], the live channel through
//! [`PushConnector`], and everything is reported as [`EngineEvent`]s.
mod api;
mod engine;
mod push;
mod types;

pub use api::{ApiSettings, ReqwestTaskApi, TaskApi, SESSION_HEADER};
pub use engine::EngineHandle;
pub use push::{classify_close, PushConnector, PushError, PushFrame, PushStream, WsConnector};
pub use types::{ApiError, EngineEvent, FailureKind, SubmittedTask, TimerId};
