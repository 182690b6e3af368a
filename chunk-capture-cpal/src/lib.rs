//! # chunk-capture-cpal
//!
//! Cross-platform microphone backend for chunk-capture-core, built on cpal.
//!
//! Provides (with the `cpal` feature):
//! - `CpalInputStream`: a [`LiveStream`](chunk_capture_core::LiveStream) over
//!   a cpal input device
//! - `list_input_devices`: input device enumeration
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use chunk_capture_core::{ChunkSpool, ChunkingConfig, LiveCapture};
//! use chunk_capture_cpal::CpalInputStream;
//!
//! let mut capture = LiveCapture::new(CpalInputStream::default_device());
//! capture.start(
//!     ChunkingConfig::default(),
//!     Arc::new(ChunkSpool::new("chunks")),
//!     Arc::new(|e| eprintln!("{e}")),
//! )?;
//! ```

pub mod errors;

#[cfg(feature = "cpal")]
pub mod cpal_input;
#[cfg(feature = "cpal")]
pub mod device_enumerator;

#[cfg(feature = "cpal")]
pub use cpal_input::CpalInputStream;
#[cfg(feature = "cpal")]
pub use device_enumerator::{default_input_device_name, list_input_devices};
