//! Domain entities - Event payloads and user records

pub mod message;
pub mod user;

pub use message::{ForwardNode, InboundEvent, MessageEvent, NoticeEvent, RequestEvent, Segment};
pub use user::{FriendInfo, UserProfile};
