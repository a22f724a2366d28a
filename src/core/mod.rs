//! Terminal session engine.
//!
//! This module contains everything between the SSH channel and the screen:
//!
//! - **transport**: Transport trait, connection errors, target/credentials
//! - **ssh**: libssh2-backed transport with a pty and interactive shell
//! - **session**: One live attachment plus its reader thread
//! - **classifier**: Line/raw mode state machine over remote output
//! - **scrollback**: Bounded line history for line mode
//! - **input**: Local line editor used in line mode
//! - **keys**: Key model and raw-mode key translation
//! - **orchestrator**: Owns the session state and builds render snapshots
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//! ├── Session
//! │   ├── Transport (SSH channel)
//! │   └── reader thread ──▶ event queue
//! ├── OutputClassifier
//! │   └── Display
//! │       ├── Line (Scrollback + scroll position)
//! │       └── Raw (accumulator)
//! └── InputLine
//! ```

pub mod classifier;
pub mod input;
pub mod keys;
pub mod orchestrator;
pub mod scrollback;
pub mod session;
pub mod ssh;
pub mod transport;
