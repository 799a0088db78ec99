//! Integration tests for persisting a runtime to sled and bringing it back.
//!
//! A restored runtime has to be indistinguishable from the one that was
//! saved: same proxies, same code behind them, same storage bytes, and the
//! same refusals (templates stay locked, setups stay spent).

use vaultline_contracts::{
    Call, ErrorKind, ImplementationVersion, Output, RuntimeError, VaultError, VaultParams,
    VaultRuntime,
};
use vaultline_protocol::{Address, BlockClock, FungibleLedger, RegionDb};

const START: u64 = 1_700_000_000;

struct Saved {
    rt: VaultRuntime<FungibleLedger>,
    admin: Address,
    alice: Address,
    proxy: Address,
    v1: Address,
    v2: Address,
}

/// Helper: a proxy on V2 with one depositor and a configured yield rate.
fn populated() -> Saved {
    vaultline_protocol::logging::try_init_test_logging();
    let token = FungibleLedger::new(Address::derive("usdv"), "USDV", 6);
    let mut rt = VaultRuntime::new(token, BlockClock::at(START));
    let admin = Address::derive("admin");
    let alice = Address::derive("alice");

    let v1 = rt.deploy_implementation(ImplementationVersion::V1).unwrap();
    let v2 = rt.deploy_implementation(ImplementationVersion::V2).unwrap();
    let params = VaultParams {
        token: rt.token().address(),
        admin,
        deposit_fee_bps: 50,
    };
    let proxy = rt.deploy_proxy(admin, v1, Some(Call::SetupV1(params))).unwrap();
    rt.upgrade_to(admin, proxy, v2, Some(Call::SetupV2)).unwrap();
    rt.call(admin, proxy, &Call::SetYieldRate { bps: 400 }).unwrap();

    rt.token_mut().mint(&alice, 20_000).unwrap();
    rt.token_mut().approve(&alice, &proxy, 20_000);
    rt.call(alice, proxy, &Call::Deposit { amount: 20_000 }).unwrap();

    Saved {
        rt,
        admin,
        alice,
        proxy,
        v1,
        v2,
    }
}

fn restore_from(db: &RegionDb, saved: &Saved) -> VaultRuntime<FungibleLedger> {
    let token = saved.rt.token().clone();
    let clock = BlockClock::at(saved.rt.now());
    VaultRuntime::restore(db, token, clock).unwrap()
}

#[test]
fn restored_runtime_matches_saved_one() {
    let saved = populated();
    let db = RegionDb::open_temporary().unwrap();
    saved.rt.persist(&db).unwrap();
    assert_eq!(db.instance_count(), 3);

    let mut rt = restore_from(&db, &saved);
    let proxy = saved.proxy;
    assert_eq!(rt.current_implementation(&proxy), Some(saved.v2));
    assert_eq!(
        rt.implementation_version(&proxy),
        Some(ImplementationVersion::V2)
    );
    assert_eq!(rt.implementation_version(&saved.v1), Some(ImplementationVersion::V1));
    assert_eq!(rt.storage(&proxy), saved.rt.storage(&proxy));
    assert_eq!(rt.storage(&saved.v1), saved.rt.storage(&saved.v1));

    let alice = saved.alice;
    assert_eq!(
        rt.call(alice, proxy, &Call::BalanceOf { account: alice }).unwrap(),
        Output::Amount(19_900)
    );
    assert_eq!(
        rt.call(alice, proxy, &Call::YieldRate).unwrap(),
        Output::Bps(400)
    );
    // events are output, not state
    assert!(rt.events(&proxy).is_empty());
}

#[test]
fn restored_runtime_keeps_working_and_upgrading() {
    let saved = populated();
    let db = RegionDb::open_temporary().unwrap();
    saved.rt.persist(&db).unwrap();
    let mut rt = restore_from(&db, &saved);
    let (admin, alice, proxy) = (saved.admin, saved.alice, saved.proxy);

    rt.call(alice, proxy, &Call::Withdraw { amount: 900 }).unwrap();
    let v3 = rt.deploy_implementation(ImplementationVersion::V3).unwrap();
    assert_ne!(v3, saved.v1);
    assert_ne!(v3, saved.v2);
    assert_ne!(v3, proxy);

    rt.upgrade_to(admin, proxy, v3, Some(Call::SetupV3)).unwrap();
    rt.call(admin, proxy, &Call::SetWithdrawalDelay { seconds: 3_600 })
        .unwrap();
    assert_eq!(
        rt.call(alice, proxy, &Call::EmergencyWithdraw).unwrap(),
        Output::Amount(19_000)
    );
}

#[test]
fn restored_setup_gate_and_template_lock_hold() {
    let saved = populated();
    let db = RegionDb::open_temporary().unwrap();
    saved.rt.persist(&db).unwrap();
    let mut rt = restore_from(&db, &saved);

    let err = rt
        .call(saved.admin, saved.proxy, &Call::SetupV2)
        .unwrap_err();
    assert_eq!(err, VaultError::AlreadyInitialized { current: 2, requested: 2 });

    let attacker = Address::derive("attacker");
    let params = VaultParams {
        token: rt.token().address(),
        admin: attacker,
        deposit_fee_bps: 0,
    };
    let err = rt
        .call_template(attacker, saved.v1, &Call::SetupV1(params))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitializationOrderViolation);
}

#[test]
fn state_survives_reopening_the_database() {
    let saved = populated();
    let dir = tempfile::tempdir().unwrap();
    {
        let db = RegionDb::open(dir.path()).unwrap();
        saved.rt.persist(&db).unwrap();
    }

    let db = RegionDb::open(dir.path()).unwrap();
    let mut rt = restore_from(&db, &saved);
    let alice = saved.alice;
    assert_eq!(
        rt.call(alice, saved.proxy, &Call::TotalDeposits).unwrap(),
        Output::Amount(19_900)
    );
}

#[test]
fn unknown_record_kind_is_rejected() {
    let db = RegionDb::open_temporary().unwrap();
    let stray = Address::derive("stray");
    db.put_instance(
        &stray,
        &vaultline_protocol::StorageRegion::new(),
        &[("kind", b"mystery".to_vec())],
    )
    .unwrap();

    let token = FungibleLedger::new(Address::derive("usdv"), "USDV", 6);
    match VaultRuntime::restore(&db, token, BlockClock::at(START)) {
        Err(RuntimeError::CorruptRecord { address, reason }) => {
            assert_eq!(address, stray);
            assert_eq!(reason, "unknown kind");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("stray record restored"),
    }
}
