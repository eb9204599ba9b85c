//! Real-time heart-rate extraction from a sampled pulse waveform.

pub mod beat;
pub mod bpm;
pub mod channels;
pub mod config;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod time;
