//! tgcollect core library: channel requests, time boundary, message sources, channel
//! walker, collection orchestrator, and JSON-lines emitter used by the CLI.

pub mod boundary;
pub mod channel;
pub mod collect;
pub mod config;
pub mod emit;
pub mod init;
pub mod record;
pub mod source;
pub mod walk;
