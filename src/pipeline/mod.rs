//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements one step. Only [`transport`] touches the
//! network; every other stage talks to it through the
//! [`transport::HttpTransport`] trait, so the whole pipeline runs against a
//! scripted transport in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ artifacts ──▶ conversation ──▶ artifacts
//! (pages)   (upload)      (rounds)         (delete)
//!                           │
//!                           ├─ tools     dispatch function calls
//!                           └─ response  parse JSON out of reply text
//! ```
//!
//! 1. [`input`]        load page images and check them before any network call
//! 2. [`artifacts`]    upload pages to the file API; delete them when done
//! 3. [`conversation`] drive the model with a shared retry budget
//! 4. [`tools`]        registry of functions the model may call
//! 5. [`response`]     fenced or raw JSON extraction from reply text
//! 6. [`transport`]    HTTP seam, endpoint layout, and credentials

pub mod artifacts;
pub mod conversation;
pub mod input;
pub mod response;
pub mod tools;
pub mod transport;
