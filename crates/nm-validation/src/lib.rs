//! # nm-validation
//!
//! Staged validation of inbound telemetry datagrams.
//!
//! ## Stages
//!
//! Each payload moves through the stages in order and stops at the first
//! failure; the stage reached is part of the outcome so a diagnostics
//! endpoint can tell a sender *where* their payload went wrong:
//!
//! 1. `json_parsing`: the raw bytes must parse to a JSON object.
//! 2. `type_recognition`: the object must carry a known `type`
//!    discriminator (compared case-insensitively at this stage only);
//!    failures always include the full supported-type list so callers can
//!    self-correct.
//! 3. deserialization + field rules: structural shape mismatches fall
//!    back to `json_parsing`; semantic rule violations are collected under
//!    stage `validation`, one entry per rule, using wire field names.
//! 4. `complete`: the typed datagram is ready for the state engine.
//!
//! The classification stage is forgiving about casing for interoperability
//! with heterogeneous, non-cooperating senders; the field rules stay strict
//! about semantic correctness (the in-payload discriminator and the
//! `direction` field are exact-case).
//!
//! Nothing in this crate ever panics on external input: every malformed
//! payload becomes a structured [`Outcome`].

pub mod outcome;
pub mod pipeline;
mod rules;

pub use outcome::{FieldError, Outcome, Stage};
pub use pipeline::{validate, TYPE_FIELD};
