//! # Collaborator Services
//!
//! The capabilities a flow consumes but does not own. Each is a trait with an
//! in-memory implementation good enough for a single-process network:
//!
//! | Trait              | In-memory impl        | Role |
//! |--------------------|-----------------------|------|
//! | [`StateStore`]     | [`InMemoryVault`]     | finalized transactions, unconsumed states |
//! | [`NotaryService`]  | [`InMemoryNotary`]    | uniqueness + time window, single writer |
//! | [`NetworkMap`]     | [`InMemoryNetworkMap`]| parties and advertised notaries |
//! | [`CashService`]    | [`VaultCashService`]  | balances and coin selection |
//! | [`SessionTransport`] | (flows crate)       | point-to-point sessions |
//!
//! Identity resolution lives in [`crate::identity`].

pub mod cash;
pub mod network_map;
pub mod notary;
pub mod session;
pub mod vault;

pub use cash::{CashError, CashService, VaultCashService};
pub use network_map::{InMemoryNetworkMap, NetworkMap};
pub use notary::{InMemoryNotary, NotaryError, NotaryService};
pub use session::{Session, SessionError, SessionTransport};
pub use vault::{InMemoryVault, StateStore, StoreError};
