//! Tasksync core: pure task-state synchronization, free of I/O.
//!
//! Push frames are decoded by the [`EventDispatcher`], applied through
//! [`update`], and the [`TaskStore`] inside [`SyncState`] stays the single
//! source of truth. Network and timer work is described by [`Effect`]s that
//! the caller executes.
mod connection;
mod dispatch;
mod effect;
mod event;
mod model;
mod msg;
mod reconcile;
mod session;
mod state;
mod store;
mod update;
mod view_model;

pub use connection::{
    CloseKind, ConnectionCommand, ConnectionId, ConnectionManager, ConnectionStatus,
    ReconnectPolicy,
};
pub use dispatch::{EventDispatcher, Observers, SubscriptionId};
pub use effect::Effect;
pub use event::{decode_event, DecodeError, TaskEvent};
pub use model::{
    compare_timestamps, ArtifactRef, PullError, SubmitRequest, TaskDetail, TaskDocument, TaskId,
    TaskStatus, TaskSummary,
};
pub use msg::Msg;
pub use reconcile::{Pull, Reconciler, Reconciliation};
pub use session::SyncSession;
pub use state::{Notice, NoticeId, SyncState, DEFAULT_NOTICE_TTL};
pub use store::{StateChange, TaskStore, Upsert};
pub use update::update;
pub use view_model::{SyncView, TaskRowView};
