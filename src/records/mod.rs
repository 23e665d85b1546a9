//! Typed domain records and their document codec.

mod codec;
mod entities;

pub use codec::{decode, encode, encode_with_rev, Entity};
pub use entities::{
    KvEntry, Matter, MatterKind, NotificationRecord, NotificationStatus, RepeatTask,
    RepeatTaskStatus, Tag, Todo, TodoStatus,
};
