// commitcast-daemon: polls repositories, digests new commits, relays
// the digest to a chat group.

pub mod config;
pub mod relay;
pub mod runtime;
pub mod source;
pub mod startup;
pub mod store;
pub mod summarize;
pub mod sync;
