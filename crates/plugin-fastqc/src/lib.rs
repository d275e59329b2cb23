//! FastQC plugin: quality control over raw sequencing reads.
//!
//! The worker consumes jobs from `dispatcher_fastqc`, runs the `fastqc`
//! binary over every `*.fastq.gz` file in the job's sample directory,
//! and stores one result envelope per job.

pub mod handler;
pub mod runner;
