//! R plugin: downstream analysis of HDF5 expression data.
//!
//! The worker consumes jobs from `dispatcher_rscript` and runs one of
//! two fixed R scripts over the job's sample directory: the standard
//! analysis script, or the interactive chat script when the job's
//! configuration selects the chat variant. Generated artifacts are
//! renamed with the analysis id and folded into the result payload; chat
//! runs additionally stamp and backfill the project's conversation.

pub mod handler;
pub mod runner;
