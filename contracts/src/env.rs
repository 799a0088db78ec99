//! # Execution Environment
//!
//! One call executes against an [`Env`]: who is calling, which instance, what
//! time it is, the instance's storage, the token, the active code, and the
//! event log. The proxy builds one per call; nothing outlives it.
//!
//! ## Atomicity
//!
//! [`execute_atomic`] snapshots storage and the event log before running a
//! call and restores both if the call fails. Token balances need no
//! snapshot: the vault only touches them through the token itself, and a
//! failed transfer moves nothing.
//!
//! ## Reentry
//!
//! While a transfer is in flight the outer call is suspended inside the
//! token. [`Reentry`] is the handle the token gets: it reborrows the same
//! storage and event log, so a callback sees exactly the state the outer
//! call left mid-flight, lock included.

use vaultline_protocol::{Address, StorageRegion};

use crate::call::{Call, Output};
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::token::Token;
use crate::vault::VaultLogic;

/// Message context of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
    /// The principal making the call.
    pub caller: Address,
    /// The instance being called. Holds the token balance.
    pub vault: Address,
    /// Block timestamp.
    pub now: u64,
}

/// Everything one call can see and touch.
pub struct Env<'a> {
    pub msg: Msg,
    pub storage: &'a mut StorageRegion,
    pub token: &'a mut dyn Token,
    pub logic: &'a dyn VaultLogic,
    pub events: &'a mut Vec<VaultEvent>,
}

impl Env<'_> {
    /// Appends an event to the instance's log.
    pub fn emit(&mut self, event: VaultEvent) {
        tracing::debug!(vault = %self.msg.vault, ?event, "event emitted");
        self.events.push(event);
    }
}

/// Runs `call` against `storage`, rolling storage and events back on failure.
pub fn execute_atomic(
    logic: &dyn VaultLogic,
    msg: Msg,
    storage: &mut StorageRegion,
    token: &mut dyn Token,
    events: &mut Vec<VaultEvent>,
    call: &Call,
) -> Result<Output, VaultError> {
    let snapshot = storage.clone();
    let mark = events.len();

    let result = {
        let mut env = Env {
            msg,
            storage: &mut *storage,
            token,
            logic,
            events: &mut *events,
        };
        logic.execute(&mut env, call)
    };

    if result.is_err() {
        *storage = snapshot;
        events.truncate(mark);
    }
    result
}

/// Callback handle passed to the token during a transfer.
pub struct Reentry<'a> {
    vault: Address,
    now: u64,
    storage: &'a mut StorageRegion,
    logic: &'a dyn VaultLogic,
    events: &'a mut Vec<VaultEvent>,
}

impl<'a> Reentry<'a> {
    pub(crate) fn new(
        msg: Msg,
        storage: &'a mut StorageRegion,
        logic: &'a dyn VaultLogic,
        events: &'a mut Vec<VaultEvent>,
    ) -> Self {
        Self {
            vault: msg.vault,
            now: msg.now,
            storage,
            logic,
            events,
        }
    }

    /// The instance whose transfer is in flight.
    pub fn vault(&self) -> Address {
        self.vault
    }

    /// Calls back into the instance as `caller`.
    ///
    /// `token` is the token making the callback; it stands in for the
    /// token for the duration of the nested call.
    pub fn call(
        &mut self,
        token: &mut dyn Token,
        caller: Address,
        call: &Call,
    ) -> Result<Output, VaultError> {
        tracing::debug!(vault = %self.vault, caller = %caller, call = call.name(), "token callback");
        let msg = Msg {
            caller,
            vault: self.vault,
            now: self.now,
        };
        execute_atomic(self.logic, msg, self.storage, token, self.events, call)
    }
}
