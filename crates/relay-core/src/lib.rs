//! # relay-core
//!
//! Wire protocol types shared by the relay hub and its collaborators.
//!
//! The wire format is a flat JSON envelope ([`Envelope`]) in which every
//! field except `type` is optional. Inside the process, messages are the
//! typed [`Frame`] enum — one variant per message kind — converted to and
//! from the envelope at the serialization boundary only.

pub mod codes;
pub mod envelope;
pub mod errors;
pub mod frame;
pub mod logging;

pub use envelope::Envelope;
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, StoredMessage, TypingAction};
