//! Polls an OW-SERVER (EDS) 1-Wire gateway for its `details.xml` status document and
//! forwards temperature and energy-counter readings to an InfluxDB series endpoint.
//!
//! Two supervised units share a single-slot hand-off channel: [`poller::SourcePoller`]
//! produces [`sample::Sample`]s and [`forwarder::SinkForwarder`] buffers them until the
//! sink accepts a batch.

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod forwarder;
#[cfg(test)]
mod mock;
pub mod pipeline;
pub mod poller;
pub mod sample;
pub mod sink;
pub mod supervisor;
