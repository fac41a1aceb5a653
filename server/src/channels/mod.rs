//! Background dispatch and progress broadcast

pub mod broadcast;
pub mod dispatch;
pub mod layer;

pub use broadcast::{Broadcaster, ALL_GROUP, DISPATCH_CHANNEL, FLAVOUR_CHANNEL, POD_CHANNEL};
pub use dispatch::{CallEnvelope, DispatchTable, Dispatcher, Job, JobHandler, JobKind, BACKEND_INBOX};
pub use layer::{ChannelLayer, ChannelMessage};
