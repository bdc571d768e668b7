//! Stateless repositories. Every method takes `&Connection` so callers
//! control pooling and transactions.

pub mod conversations;
pub mod messages;
pub mod sessions;
pub mod users;

pub use conversations::ConversationRepo;
pub use messages::MessageRepo;
pub use sessions::{SessionRepo, SessionRow};
pub use users::{UserRepo, UserRow};
