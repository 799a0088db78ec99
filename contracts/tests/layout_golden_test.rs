//! Golden tests for the persisted storage layout.
//!
//! The layout is a contract with every byte already on disk. These tests
//! pin it twice: once as the declared field table, and once as the raw
//! words a real instance writes, checked again after each upgrade.

use serde_json::json;
use vaultline_contracts::layout::{fields, layout_for, LAYOUT_V1, LAYOUT_V2, LAYOUT_V3};
use vaultline_contracts::{Call, ImplementationVersion, VaultParams, VaultRuntime};
use vaultline_protocol::{Address, BlockClock, FungibleLedger, SlotKey, StorageRegion, Word};

#[test]
fn v1_layout_matches_golden_table() {
    let report = serde_json::to_value(LAYOUT_V1.report()).unwrap();
    let golden = json!({
        "schema": 1,
        "fields": [
            { "name": "initialized_version", "slot": 0, "offset": 0, "width": 1, "kind": "uint" },
            { "name": "reentrancy_status", "slot": 1, "offset": 0, "width": 1, "kind": "uint" },
            { "name": "roles", "slot": 2, "offset": 0, "width": 32, "kind": "nested_mapping" },
            { "name": "token", "slot": 3, "offset": 0, "width": 20, "kind": "address" },
            { "name": "deposit_fee_bps", "slot": 3, "offset": 20, "width": 2, "kind": "uint" },
            { "name": "total_credited", "slot": 4, "offset": 0, "width": 8, "kind": "uint" },
            { "name": "balances", "slot": 5, "offset": 0, "width": 32, "kind": "mapping" }
        ],
        "gap": { "start": 6, "len": 50 }
    });
    assert_eq!(report, golden);
}

#[test]
fn later_layouts_append_to_the_golden_table() {
    let v1 = serde_json::to_value(LAYOUT_V1.report()).unwrap();
    for layout in [LAYOUT_V2, LAYOUT_V3] {
        let report = serde_json::to_value(layout.report()).unwrap();
        let old = v1["fields"].as_array().unwrap();
        let new = report["fields"].as_array().unwrap();
        assert_eq!(&new[..old.len()], &old[..]);
    }

    let v3 = LAYOUT_V3.report();
    let appended: Vec<_> = v3.fields[7..]
        .iter()
        .map(|f| (f.name.as_str(), f.slot, f.offset))
        .collect();
    assert_eq!(
        appended,
        vec![
            ("yield_rate_bps", 6, 0),
            ("deposits_paused", 6, 2),
            ("last_claim", 7, 0),
            ("withdrawal_delay_secs", 8, 0),
            ("pending_withdrawals", 9, 0),
        ]
    );
    assert_eq!((v3.gap.start, v3.gap.len), (10, 46));
}

#[test]
fn every_release_extends_every_older_one() {
    for (i, newer) in ImplementationVersion::ALL.iter().enumerate() {
        for older in &ImplementationVersion::ALL[..=i] {
            newer
                .layout()
                .verify_extends(older.layout())
                .unwrap_or_else(|e| panic!("{newer} does not extend {older}: {e}"));
        }
        assert_eq!(layout_for(newer.schema()), Some(newer.layout()));
    }
}

#[test]
fn report_json_is_stable_text() {
    let json = LAYOUT_V2.report().to_json().unwrap();
    assert!(json.contains("\"deposits_paused\""));
    assert!(json.contains("\"kind\": \"bool\""));
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["gap"]["start"], 8);
}

// ---------------------------------------------------------------------------
// Raw words
// ---------------------------------------------------------------------------

fn word(parts: &[(usize, &[u8])]) -> Word {
    let mut w = [0u8; 32];
    for (offset, bytes) in parts {
        w[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    }
    w
}

fn fixed_words(storage: &StorageRegion) -> Vec<(u64, Word)> {
    storage.fixed_slots().map(|(i, w)| (i, *w)).collect()
}

#[test]
fn persisted_words_keep_their_meaning_across_upgrades() {
    let token = FungibleLedger::new(Address::derive("usdv"), "USDV", 6);
    let token_address = token.address();
    let mut rt = VaultRuntime::new(token, BlockClock::at(1_700_000_000));
    let admin = Address::derive("admin");
    let alice = Address::derive("alice");

    let v1 = rt.deploy_implementation(ImplementationVersion::V1).unwrap();
    let v2 = rt.deploy_implementation(ImplementationVersion::V2).unwrap();
    let v3 = rt.deploy_implementation(ImplementationVersion::V3).unwrap();
    let params = VaultParams {
        token: token_address,
        admin,
        deposit_fee_bps: 0x0102,
    };
    let proxy = rt.deploy_proxy(admin, v1, Some(Call::SetupV1(params))).unwrap();
    rt.token_mut().mint(&alice, 100_000).unwrap();
    rt.token_mut().approve(&alice, &proxy, 100_000);
    rt.call(alice, proxy, &Call::Deposit { amount: 100_000 }).unwrap();

    // 100_000 less a 2.58% fee
    let credited: u64 = 100_000 - 2_580;
    let storage = rt.storage(&proxy).unwrap();
    assert_eq!(
        fixed_words(storage),
        vec![
            (0, word(&[(0, &[1])])),
            (1, word(&[(0, &[1])])),
            (3, word(&[(0, token_address.as_bytes()), (20, &[0x01, 0x02])])),
            (4, word(&[(0, &credited.to_be_bytes())])),
        ]
    );
    let balance_slot = fields::BALANCES.entry(&alice);
    assert_eq!(
        storage.read_word(balance_slot),
        word(&[(0, &credited.to_be_bytes())])
    );
    let admin_role = SlotKey::mapping_address(fields::ROLES.entry_bytes(&[0u8; 32]), &admin);
    assert_eq!(storage.read_word(admin_role), word(&[(0, &[1])]));

    let before = storage.clone();
    rt.upgrade_to(admin, proxy, v2, Some(Call::SetupV2)).unwrap();
    rt.upgrade_to(admin, proxy, v3, Some(Call::SetupV3)).unwrap();
    let after = rt.storage(&proxy).unwrap();

    // only the version byte moved
    assert_eq!(after.read_word(SlotKey::fixed(0)), word(&[(0, &[3])]));
    for (key, value) in before.iter() {
        if key.fixed_index() != Some(0) {
            assert_eq!(&after.read_word(*key), value);
        }
    }
    assert_eq!(after.len(), before.len());
}

#[test]
fn every_written_fixed_slot_is_declared() {
    let token = FungibleLedger::new(Address::derive("usdv"), "USDV", 6);
    let mut rt = VaultRuntime::new(token, BlockClock::at(1_700_000_000));
    let admin = Address::derive("admin");
    let v3 = rt.deploy_implementation(ImplementationVersion::V3).unwrap();
    let params = VaultParams {
        token: rt.token().address(),
        admin,
        deposit_fee_bps: 10,
    };
    let proxy = rt.deploy_proxy(admin, v3, Some(Call::SetupV1(params))).unwrap();
    for call in [
        Call::SetupV2,
        Call::SetupV3,
        Call::SetYieldRate { bps: 300 },
        Call::GrantRole {
            role: vaultline_contracts::Role::Pauser,
            account: admin,
        },
        Call::PauseDeposits,
        Call::SetWithdrawalDelay { seconds: 7_200 },
    ] {
        rt.call(admin, proxy, &call).unwrap();
    }

    let storage = rt.storage(&proxy).unwrap();
    for (index, _) in storage.fixed_slots() {
        assert!(
            LAYOUT_V3.fields.iter().any(|f| f.slot == index),
            "slot {index} written but not declared"
        );
        assert!(index < LAYOUT_V3.gap.start);
    }
}
