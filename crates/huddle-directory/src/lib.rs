//! Identity directory lookups for the huddle reconciler.
//!
//! Maps tracker-side collaborator identifiers (emails) to chat-platform user
//! ids. Resolution is always a lookup: an unreachable backing store makes
//! every identifier resolve absent for the current poll cycle, never an
//! error that aborts a flow.

mod identity_resolver;

pub use identity_resolver::{FileIdentityResolver, IdentityResolver};
