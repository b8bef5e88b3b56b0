//! Background jobs.
//!
//! Each job is a long-running async function meant to be spawned with
//! `tokio::spawn` and stopped through a [`tokio_util::sync::CancellationToken`].

pub mod scheduler;
