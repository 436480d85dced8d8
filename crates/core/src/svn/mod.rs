//! Subversion client seam and its `svn` CLI implementation.

pub mod backend;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod parser;

pub use backend::{
    CommitInfo, ConflictChoice, ConflictDescription, ConflictHandler, ConflictKind, Credentials,
    NodeKind, ProxySettings, Revision, SvnBackend,
};
pub use client::SvnClient;
pub use parser::*;
