use votechain_chain::{Ledger, LedgerConfig};
use votechain_consensus::VerificationStatus;
use votechain_core::{seal_hash, GENESIS_HASH};
use votechain_storage::Storage;

fn config() -> LedgerConfig {
    LedgerConfig {
        batch_size: 10,
        tx_per_block: 5,
        ..LedgerConfig::default()
    }
}

#[test]
fn test_tamper_and_repair_round() {
    let storage = Storage::open_temporary().unwrap();
    let ledger = Ledger::new(&storage, config()).unwrap();

    assert_eq!(ledger.ingest(10, 5).unwrap(), 10);
    assert_eq!(ledger.votes().block_ids().unwrap(), vec![1, 2]);

    let sealed = ledger.seal().unwrap();
    assert_eq!(sealed.len(), 2);

    let blocks = ledger.list_blocks().unwrap();
    assert_eq!(blocks[0].hash, GENESIS_HASH);
    for block in &blocks[1..] {
        assert!(block.hash.starts_with('0'));
        assert_eq!(
            seal_hash(&block.prev_hash, &block.merkle_root, block.nonce, block.timestamp),
            block.hash
        );
    }

    let detail = ledger.block_detail("1").unwrap();
    assert_eq!(detail.verification.status, VerificationStatus::Verified);

    let victim = detail.transactions[3].id.clone();
    ledger.tamper_delete(&victim).unwrap();
    assert_eq!(
        ledger.block_detail("1").unwrap().verification.status,
        VerificationStatus::Tampered
    );
    assert_eq!(
        ledger.verify_block(2).unwrap().status,
        VerificationStatus::Verified
    );

    let report = ledger.sync_block(1).unwrap();
    assert_eq!(report.restored, 5);
    let repaired = ledger.block_detail("1").unwrap();
    assert_eq!(repaired.verification.status, VerificationStatus::Verified);
    assert_eq!(repaired.transactions, detail.transactions);
}

#[test]
fn test_sync_is_idempotent() {
    let storage = Storage::open_temporary().unwrap();
    let ledger = Ledger::new(&storage, config()).unwrap();
    ledger.ingest(10, 5).unwrap();
    ledger.seal().unwrap();

    let first_vote = ledger.votes().all().unwrap()[0].id.clone();
    ledger.tamper_delete(&first_vote).unwrap();

    ledger.sync_block(1).unwrap();
    let once = ledger.votes().transactions_for_block(1).unwrap();
    ledger.sync_block(1).unwrap();
    assert_eq!(ledger.votes().transactions_for_block(1).unwrap(), once);

    ledger.sync_all().unwrap();
    let all_once = ledger.votes().all().unwrap();
    ledger.sync_all().unwrap();
    assert_eq!(ledger.votes().all().unwrap(), all_once);
    assert_eq!(all_once, ledger.backup().all().unwrap());

    assert!(ledger
        .verify_recent(2)
        .unwrap()
        .iter()
        .all(|v| v.status == VerificationStatus::Verified));
}

#[test]
fn test_chain_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let hashes: Vec<String> = {
        let storage = Storage::open(dir.path()).unwrap();
        let ledger = Ledger::new(&storage, config()).unwrap();
        ledger.ingest(10, 5).unwrap();
        ledger.seal().unwrap().into_iter().map(|s| s.hash).collect()
    };

    let storage = Storage::open(dir.path()).unwrap();
    let ledger = Ledger::new(&storage, config()).unwrap();
    let stats = ledger.stats().unwrap();
    assert_eq!(stats.height, 2);
    assert_eq!(stats.tip.as_deref(), hashes.last().map(String::as_str));
    assert_eq!(stats.live_votes, 10);
    assert_eq!(ledger.validate_chain().unwrap(), 3);
    assert!(ledger.seal().unwrap().is_empty());
}

#[test]
fn test_second_run_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = Storage::open(dir.path()).unwrap();
        let ledger = Ledger::new(&storage, config()).unwrap();
        ledger.ingest(10, 5).unwrap();
        ledger.seal().unwrap();
    }

    let storage = Storage::open(dir.path()).unwrap();
    let ledger = Ledger::new(&storage, config()).unwrap();
    ledger.ingest(10, 5).unwrap();
    let sealed = ledger.seal().unwrap();
    assert_eq!(sealed.len(), 2);
    assert_eq!(sealed[0].block_id, 3);

    ledger.sync_all().unwrap();
    let findings = ledger.verify_recent(4).unwrap();
    assert_eq!(findings.len(), 4);
    assert!(findings
        .iter()
        .all(|v| v.status == VerificationStatus::Verified));
}
