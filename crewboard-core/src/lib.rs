//! Crewboard core: the hiring-pipeline stage board.
//!
//! Candidates move through a fixed set of stages. Each stage pages through its
//! own slice of a remote record store under a shared search/category filter,
//! and records can be dragged from one stage to another.
//!
//! - [`board::BoardController`] orchestrates loads, filtering and transitions
//! - [`storage::RecordStore`] is the async store interface; [`storage::memory::MemoryStore`] implements it in-process
//! - [`filter`] builds query predicates, [`pagination`] does the page arithmetic
//! - [`stages`] defines the pipeline and per-stage state

pub mod board;
pub mod collaborators;
pub mod config;
pub mod filter;
pub mod pagination;
pub mod stages;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
