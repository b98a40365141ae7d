//! Core serial terminal engine.
//!
//! This module contains everything between the serial port and the screen:
//!
//! - **transport**: Byte transport trait and its `serialport` implementation
//! - **framer**: Reassembles the byte stream into lines
//! - **sgr**: Per-line ANSI color classification and escape stripping
//! - **log_sink**: Optional append-only traffic log
//! - **session**: Connection lifecycle plus the reader and writer threads
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── reader thread: Transport → LineFramer → sgr::interpret → SessionEvent::Line
//! │                                                          └→ LogSink
//! └── writer thread: send queue → Transport
//!                                 └→ LogSink ("Sent: ...")
//! ```

pub mod error;
pub mod framer;
pub mod log_sink;
pub mod session;
pub mod sgr;
pub mod transport;
