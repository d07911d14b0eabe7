// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Obligation Ledger Core Library
//!
//! Ledger primitives for bilateral obligations: who owes whom how much, how
//! much has been paid, and the cryptographic plumbing that lets several
//! parties agree on every change.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys, SHA-256 transaction ids, BLAKE3 certificate payloads.
//! - **ledger**: Amounts, identifiers, parties, obligation and cash states.
//! - **transaction**: Builder, content-addressed wire form, signatures.
//! - **identity**: Key management, confidential identity certificates, resolution.
//! - **services**: State store, notary, network map, cash, session transport.
//! - **config**: Protocol constants and `FlowConfig`.
//!
//! Business rules (what makes a transaction *valid*) live in the contracts
//! crate; the multi-party protocol lives in the flows crate.
//!
//! ## Design Philosophy
//!
//! 1. States are immutable values. A change is a new value plus a transaction.
//! 2. Everyone signs the same content hash, never a re-encoding of it.
//! 3. The notary is the only ordering authority. Nothing else takes a lock
//!    across parties.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod services;
pub mod transaction;
