//! Collaborators the command layer talks to: user storage, chat
//! administrators and message delivery

pub mod delivery;
pub mod directory;
pub mod members;

pub use delivery::{DeliveryError, MessageDelivery, RecordingDelivery, SentMessage};
pub use directory::{DirectoryError, InMemoryDirectory, UserDirectory};
pub use members::{AdminStatus, ChatAdmin, ChatMembers, InMemoryMembers, MembersError, Permission};
