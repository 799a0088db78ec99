//! # Vault Runtime: the Indirection Layer
//!
//! Routes calls to whichever code version a proxy instance currently points
//! at, while the instance keeps one address and one storage region for life.
//!
//! ```text
//!             ┌──────────────┐   implementation   ┌──────────────────┐
//!  caller ──► │ proxy 0xab…  │ ─────────────────► │ template V2      │
//!             │ storage      │                    │ (locked storage) │
//!             └──────────────┘                    └──────────────────┘
//!                    │ upgrade_to(V3)
//!                    ▼
//!             same storage, new code
//! ```
//!
//! ## Guarantees
//!
//! - **Atomic calls**: storage and events roll back on any failure.
//! - **Atomic upgrades**: the code swap and its setup call succeed together
//!   or neither happens.
//! - **Gated upgrades**: only UPGRADER holders, and only to code whose
//!   layout append-only extends the active one.
//! - **Locked templates**: implementation storage is stamped with the
//!   initializer sentinel at deployment, so no setup can ever run on it.
//!
//! ## Persistence
//!
//! [`VaultRuntime::persist`] writes every template and proxy to a
//! [`RegionDb`]. Event logs are observable output, not state, and are not
//! persisted.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use vaultline_protocol::address::ADDRESS_LENGTH;
use vaultline_protocol::storage::DbError;
use vaultline_protocol::{Address, BlockClock, RegionDb, StorageRegion};

use crate::access::{self, Role};
use crate::call::{Call, Output};
use crate::env::{execute_atomic, Msg};
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::initializer;
use crate::token::Token;
use crate::vault::{ImplementationVersion, VaultLogic};

const META_KIND: &str = "kind";
const META_VERSION: &str = "version";
const META_IMPLEMENTATION: &str = "implementation";

const KIND_TEMPLATE: &[u8] = b"template";
const KIND_PROXY: &[u8] = b"proxy";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from persisting or restoring a runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A persisted record cannot be interpreted.
    #[error("corrupt record for {address}: {reason}")]
    CorruptRecord {
        /// The instance the record belongs to.
        address: Address,
        /// What was wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A deployed logic template.
#[derive(Debug)]
struct Implementation {
    version: ImplementationVersion,
    logic: Arc<dyn VaultLogic>,
    storage: StorageRegion,
    events: Vec<VaultEvent>,
}

impl Implementation {
    fn new(version: ImplementationVersion, storage: StorageRegion) -> Self {
        Self {
            version,
            logic: version.logic(),
            storage,
            events: Vec::new(),
        }
    }
}

/// A live proxy instance.
#[derive(Debug)]
struct Instance {
    implementation: Address,
    storage: StorageRegion,
    events: Vec<VaultEvent>,
}

/// Templates, proxies, one token and a clock.
pub struct VaultRuntime<T: Token> {
    clock: BlockClock,
    token: T,
    implementations: BTreeMap<Address, Implementation>,
    instances: BTreeMap<Address, Instance>,
    deployments: u64,
}

impl<T: Token> VaultRuntime<T> {
    pub fn new(token: T, clock: BlockClock) -> Self {
        Self {
            clock,
            token,
            implementations: BTreeMap::new(),
            instances: BTreeMap::new(),
            deployments: 0,
        }
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    /// Direct access to the token, for minting and approvals.
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Moves the clock forward. Returns the new timestamp.
    pub fn advance_time(&mut self, secs: u64) -> u64 {
        self.clock.advance(secs)
    }

    fn next_address(&mut self, kind: &str) -> Address {
        loop {
            self.deployments += 1;
            let address = Address::derive(&format!("vaultline/{kind}/{}", self.deployments));
            if !self.implementations.contains_key(&address) && !self.instances.contains_key(&address) {
                return address;
            }
        }
    }

    fn logic_at(&self, implementation: &Address) -> Result<Arc<dyn VaultLogic>, VaultError> {
        self.implementations
            .get(implementation)
            .map(|imp| Arc::clone(&imp.logic))
            .ok_or(VaultError::UnknownImplementation(*implementation))
    }

    // -- Deployment ----------------------------------------------------------

    /// Deploys a logic template and locks its storage.
    pub fn deploy_implementation(&mut self, version: ImplementationVersion) -> Result<Address, VaultError> {
        let mut storage = StorageRegion::new();
        initializer::lock_template(&mut storage)?;
        let address = self.next_address("implementation");
        self.implementations
            .insert(address, Implementation::new(version, storage));
        tracing::info!(implementation = %address, %version, "implementation deployed");
        Ok(address)
    }

    /// Deploys a proxy pointing at `implementation`, running `setup` (if
    /// any) as `deployer` in the same step. A failed setup leaves no proxy
    /// behind.
    pub fn deploy_proxy(
        &mut self,
        deployer: Address,
        implementation: Address,
        setup: Option<Call>,
    ) -> Result<Address, VaultError> {
        let version = self
            .implementations
            .get(&implementation)
            .map(|imp| imp.version)
            .ok_or(VaultError::UnknownImplementation(implementation))?;

        let address = self.next_address("proxy");
        self.instances.insert(
            address,
            Instance {
                implementation,
                storage: StorageRegion::new(),
                events: Vec::new(),
            },
        );

        if let Some(call) = setup {
            if let Err(err) = self.call(deployer, address, &call) {
                self.instances.remove(&address);
                return Err(err);
            }
        }
        tracing::info!(proxy = %address, implementation = %implementation, %version, "proxy deployed");
        Ok(address)
    }

    // -- Calls ---------------------------------------------------------------

    /// Executes `call` on `proxy` as `caller`. All-or-nothing.
    pub fn call(&mut self, caller: Address, proxy: Address, call: &Call) -> Result<Output, VaultError> {
        let now = self.clock.now();
        let result = match self.instances.get_mut(&proxy) {
            Some(instance) => {
                let logic = self
                    .implementations
                    .get(&instance.implementation)
                    .map(|imp| Arc::clone(&imp.logic))
                    .ok_or(VaultError::UnknownImplementation(instance.implementation))?;
                let msg = Msg {
                    caller,
                    vault: proxy,
                    now,
                };
                execute_atomic(
                    logic.as_ref(),
                    msg,
                    &mut instance.storage,
                    &mut self.token,
                    &mut instance.events,
                    call,
                )
            }
            None => Err(VaultError::UnknownInstance(proxy)),
        };
        log_outcome(caller, proxy, call, &result);
        result
    }

    /// Executes `call` directly on a template, against its own locked
    /// storage.
    pub fn call_template(
        &mut self,
        caller: Address,
        implementation: Address,
        call: &Call,
    ) -> Result<Output, VaultError> {
        let now = self.clock.now();
        let result = match self.implementations.get_mut(&implementation) {
            Some(template) => {
                let logic = Arc::clone(&template.logic);
                let msg = Msg {
                    caller,
                    vault: implementation,
                    now,
                };
                execute_atomic(
                    logic.as_ref(),
                    msg,
                    &mut template.storage,
                    &mut self.token,
                    &mut template.events,
                    call,
                )
            }
            None => Err(VaultError::UnknownImplementation(implementation)),
        };
        log_outcome(caller, implementation, call, &result);
        result
    }

    // -- Upgrades ------------------------------------------------------------

    /// Points `proxy` at `implementation` and runs `setup` (if any), as one
    /// step. UPGRADER only.
    pub fn upgrade_to(
        &mut self,
        caller: Address,
        proxy: Address,
        implementation: Address,
        setup: Option<Call>,
    ) -> Result<(), VaultError> {
        let next = self.logic_at(&implementation)?;
        let instance = self
            .instances
            .get(&proxy)
            .ok_or(VaultError::UnknownInstance(proxy))?;
        let current = self.logic_at(&instance.implementation)?;

        if !access::has_role(&instance.storage, Role::Upgrader, &caller)? {
            tracing::warn!(caller = %caller, proxy = %proxy, "upgrade rejected: not an upgrader");
            return Err(VaultError::Unauthorized {
                role: Role::Upgrader,
                account: caller,
            });
        }
        if let Err(err) = next.layout().verify_extends(current.layout()) {
            tracing::warn!(proxy = %proxy, from = %current.version(), to = %next.version(), error = %err, "upgrade rejected: layout");
            return Err(err.into());
        }

        let previous = instance.implementation;
        let mark = instance.events.len();
        if let Some(instance) = self.instances.get_mut(&proxy) {
            instance.implementation = implementation;
            instance.events.push(VaultEvent::Upgraded { implementation });
        }

        if let Some(call) = setup {
            if let Err(err) = self.call(caller, proxy, &call) {
                if let Some(instance) = self.instances.get_mut(&proxy) {
                    instance.implementation = previous;
                    instance.events.truncate(mark);
                }
                tracing::warn!(proxy = %proxy, error = %err, "upgrade rolled back");
                return Err(err);
            }
        }

        tracing::info!(
            proxy = %proxy,
            from = %current.version(),
            to = %next.version(),
            implementation = %implementation,
            "proxy upgraded"
        );
        Ok(())
    }

    // -- Introspection -------------------------------------------------------

    /// The implementation `proxy` currently points at.
    pub fn current_implementation(&self, proxy: &Address) -> Option<Address> {
        self.instances.get(proxy).map(|i| i.implementation)
    }

    /// Version of the code at `address`: a template, or a proxy's target.
    pub fn implementation_version(&self, address: &Address) -> Option<ImplementationVersion> {
        let implementation = self
            .instances
            .get(address)
            .map(|i| i.implementation)
            .unwrap_or(*address);
        self.implementations.get(&implementation).map(|imp| imp.version)
    }

    /// The event log of a proxy or template. Empty if unknown.
    pub fn events(&self, address: &Address) -> &[VaultEvent] {
        if let Some(instance) = self.instances.get(address) {
            &instance.events
        } else if let Some(template) = self.implementations.get(address) {
            &template.events
        } else {
            &[]
        }
    }

    /// Raw storage of a proxy or template.
    pub fn storage(&self, address: &Address) -> Option<&StorageRegion> {
        self.instances
            .get(address)
            .map(|i| &i.storage)
            .or_else(|| self.implementations.get(address).map(|t| &t.storage))
    }

    /// Addresses of every proxy instance.
    pub fn proxies(&self) -> impl Iterator<Item = &Address> {
        self.instances.keys()
    }

    // -- Persistence ---------------------------------------------------------

    /// Writes every template and proxy to `db`.
    pub fn persist(&self, db: &RegionDb) -> Result<(), RuntimeError> {
        for (address, template) in &self.implementations {
            db.put_instance(
                address,
                &template.storage,
                &[
                    (META_KIND, KIND_TEMPLATE.to_vec()),
                    (META_VERSION, vec![template.version.schema()]),
                ],
            )?;
        }
        for (address, instance) in &self.instances {
            db.put_instance(
                address,
                &instance.storage,
                &[
                    (META_KIND, KIND_PROXY.to_vec()),
                    (META_IMPLEMENTATION, instance.implementation.as_bytes().to_vec()),
                ],
            )?;
        }
        db.flush()?;
        tracing::info!(
            templates = self.implementations.len(),
            proxies = self.instances.len(),
            "runtime persisted"
        );
        Ok(())
    }

    /// Rebuilds a runtime from `db`, around a token and clock supplied by
    /// the caller.
    pub fn restore(db: &RegionDb, token: T, clock: BlockClock) -> Result<Self, RuntimeError> {
        let mut runtime = Self::new(token, clock);

        for address in db.instances()? {
            let corrupt = |reason: &str| RuntimeError::CorruptRecord {
                address,
                reason: reason.to_string(),
            };
            let storage = db
                .get_region(&address)?
                .ok_or_else(|| corrupt("missing storage region"))?;
            let kind = db
                .get_metadata(&address, META_KIND)?
                .ok_or_else(|| corrupt("missing kind"))?;

            match kind.as_slice() {
                KIND_TEMPLATE => {
                    let version = db
                        .get_metadata(&address, META_VERSION)?
                        .and_then(|v| v.first().copied())
                        .and_then(ImplementationVersion::from_schema)
                        .ok_or_else(|| corrupt("missing or unknown version"))?;
                    runtime
                        .implementations
                        .insert(address, Implementation::new(version, storage));
                }
                KIND_PROXY => {
                    let bytes: [u8; ADDRESS_LENGTH] = db
                        .get_metadata(&address, META_IMPLEMENTATION)?
                        .and_then(|v| v.try_into().ok())
                        .ok_or_else(|| corrupt("missing or malformed implementation"))?;
                    runtime.instances.insert(
                        address,
                        Instance {
                            implementation: Address::from_bytes(bytes),
                            storage,
                            events: Vec::new(),
                        },
                    );
                }
                _ => return Err(corrupt("unknown kind")),
            }
        }

        for (address, instance) in &runtime.instances {
            if !runtime.implementations.contains_key(&instance.implementation) {
                return Err(RuntimeError::CorruptRecord {
                    address: *address,
                    reason: format!("points at unknown implementation {}", instance.implementation),
                });
            }
        }

        runtime.deployments = (runtime.implementations.len() + runtime.instances.len()) as u64;
        tracing::info!(
            templates = runtime.implementations.len(),
            proxies = runtime.instances.len(),
            "runtime restored"
        );
        Ok(runtime)
    }
}

fn log_outcome(caller: Address, target: Address, call: &Call, result: &Result<Output, VaultError>) {
    match result {
        Ok(_) if call.is_view() => {}
        Ok(_) => tracing::debug!(caller = %caller, target = %target, call = call.name(), "call succeeded"),
        Err(err) => tracing::warn!(
            caller = %caller,
            target = %target,
            call = call.name(),
            kind = ?err.kind(),
            error = %err,
            "call rejected"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
