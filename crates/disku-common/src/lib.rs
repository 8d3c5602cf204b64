//! Wire types shared by the disku agent and server.

pub mod types;
