use fluxtracker::database::{BlockRow, Database, NodeStatsRow, TransactionRow};

fn block(height: u64, timestamp: i64) -> BlockRow {
    BlockRow {
        height,
        hash: format!("hash{}", height),
        timestamp,
    }
}

fn payment(tx_hash: &str, height: u64, vout: u32, address: &str, value: f64, ts: i64) -> TransactionRow {
    TransactionRow {
        tx_hash: tx_hash.to_string(),
        block_height: height,
        vout_index: vout,
        address: address.to_string(),
        from_address: Some("tSENDER".to_string()),
        value,
        timestamp: ts,
    }
}

#[test]
fn insert_batch_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let blocks = vec![block(100, 1_000), block(101, 1_060)];
    let txs = vec![payment("tx1", 100, 0, "tADDR1", 1.5, 1_000)];

    let (b1, t1) = db.insert_batch(&blocks, &txs).unwrap();
    assert_eq!((b1, t1), (2, 1));

    let (b2, t2) = db.insert_batch(&blocks, &txs).unwrap();
    assert_eq!((b2, t2), (0, 0));

    let frontier = db.frontier().unwrap();
    assert_eq!(frontier.block_count, 2);
}

#[test]
fn duplicate_triple_is_ignored_but_other_rows_land() {
    let db = Database::open_in_memory().unwrap();
    db.insert_batch(&[block(100, 1_000)], &[payment("tx1", 100, 0, "tADDR1", 1.0, 1_000)])
        .unwrap();

    // Same triple again plus one genuinely new row
    let (_, inserted) = db
        .insert_batch(
            &[],
            &[
                payment("tx1", 100, 0, "tADDR1", 1.0, 1_000),
                payment("tx1", 100, 1, "tADDR1", 2.0, 1_000),
            ],
        )
        .unwrap();
    assert_eq!(inserted, 1);

    let totals = db.total_revenue("tADDR1").unwrap();
    assert_eq!(totals.count, 2);
    assert!((totals.total - 3.0).abs() < 1e-9);
}

#[test]
fn frontier_reports_min_max_and_count() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.frontier().unwrap().highest.is_none());

    db.insert_batch(&[block(50, 1_000), block(200, 2_000), block(120, 1_500)], &[])
        .unwrap();
    let frontier = db.frontier().unwrap();
    assert_eq!(frontier.block_count, 3);
    assert_eq!(frontier.lowest, Some(50));
    assert_eq!(frontier.highest, Some(200));
}

#[test]
fn missing_heights_detects_gaps() {
    let db = Database::open_in_memory().unwrap();
    db.insert_batch(
        &[block(10, 1_000), block(11, 1_060), block(14, 1_240)],
        &[],
    )
    .unwrap();

    assert_eq!(db.missing_heights(10, 14).unwrap(), vec![12, 13]);
    assert_eq!(db.missing_heights(10, 11).unwrap(), Vec::<u64>::new());
    assert_eq!(db.missing_heights(20, 10).unwrap(), Vec::<u64>::new());
}

#[test]
fn prune_preserves_rows_at_or_after_cutoff() {
    let db = Database::open_in_memory().unwrap();
    db.insert_batch(
        &[block(1, 100), block(2, 200), block(3, 300)],
        &[
            payment("tx1", 1, 0, "tADDR1", 1.0, 100),
            payment("tx2", 2, 0, "tADDR1", 2.0, 200),
            payment("tx3", 3, 0, "tADDR1", 3.0, 300),
        ],
    )
    .unwrap();

    let (pruned_txs, pruned_blocks) = db.prune_older_than(200).unwrap();
    assert_eq!((pruned_txs, pruned_blocks), (1, 1));

    // The row exactly at the cutoff survives
    let totals = db.total_revenue("tADDR1").unwrap();
    assert_eq!(totals.count, 2);
    assert_eq!(totals.first_timestamp, Some(200));

    let frontier = db.frontier().unwrap();
    assert_eq!(frontier.lowest, Some(2));
}

#[test]
fn daily_revenue_sums_match_total_revenue() {
    let db = Database::open_in_memory().unwrap();
    // Three calendar days: 86400-second spacing
    db.insert_batch(
        &[block(1, 86_400), block(2, 172_800), block(3, 172_900), block(4, 259_200)],
        &[
            payment("tx1", 1, 0, "tADDR1", 1.5, 86_400),
            payment("tx2", 2, 0, "tADDR1", 2.5, 172_800),
            payment("tx3", 3, 0, "tADDR1", 0.5, 172_900),
            payment("tx4", 4, 0, "tADDR1", 4.0, 259_200),
        ],
    )
    .unwrap();

    let daily = db.daily_revenue("tADDR1", 0).unwrap();
    assert_eq!(daily.len(), 3);
    // Middle day combines two payments
    assert!((daily[1].total - 3.0).abs() < 1e-9);
    assert_eq!(daily[1].count, 2);

    let daily_sum: f64 = daily.iter().map(|d| d.total).sum();
    let daily_count: u64 = daily.iter().map(|d| d.count).sum();
    let totals = db.total_revenue("tADDR1").unwrap();
    assert!((daily_sum - totals.total).abs() < 1e-9);
    assert_eq!(daily_count, totals.count);
}

#[test]
fn revenue_in_block_range_is_inclusive() {
    let db = Database::open_in_memory().unwrap();
    db.insert_batch(
        &[block(10, 1_000), block(20, 2_000), block(30, 3_000)],
        &[
            payment("tx1", 10, 0, "tADDR1", 1.0, 1_000),
            payment("tx2", 20, 0, "tADDR1", 2.0, 2_000),
            payment("tx3", 30, 0, "tADDR1", 4.0, 3_000),
        ],
    )
    .unwrap();

    let (sum, count) = db.revenue_in_block_range("tADDR1", 10, 20).unwrap();
    assert!((sum - 3.0).abs() < 1e-9);
    assert_eq!(count, 2);

    let (sum, count) = db.revenue_in_block_range("tADDR1", 11, 19).unwrap();
    assert_eq!(sum, 0.0);
    assert_eq!(count, 0);
}

#[test]
fn transactions_page_filters_and_searches() {
    let db = Database::open_in_memory().unwrap();
    let mut txs = Vec::new();
    for i in 0..25u64 {
        txs.push(payment(
            &format!("hash{:02}", i),
            i,
            0,
            if i % 2 == 0 { "tADDR1" } else { "tADDR2" },
            i as f64,
            1_000 + i as i64,
        ));
    }
    let blocks: Vec<BlockRow> = (0..25).map(|i| block(i, 1_000 + i as i64)).collect();
    db.insert_batch(&blocks, &txs).unwrap();

    // Address filter with pagination, newest first
    let (page, total) = db.transactions_page(Some("tADDR1"), 1, 5, None).unwrap();
    assert_eq!(total, 13);
    assert_eq!(page.len(), 5);
    assert_eq!(page[0].block_height, 24);

    let (page2, _) = db.transactions_page(Some("tADDR1"), 3, 5, None).unwrap();
    assert_eq!(page2.len(), 3);

    // Substring search on tx hash
    let (found, total) = db.transactions_page(None, 1, 50, Some("hash1")).unwrap();
    assert_eq!(total, 10);
    assert!(found.iter().all(|t| t.tx_hash.contains("hash1")));

    // Search on sender
    let (found, _) = db.transactions_page(None, 1, 50, Some("tSENDER")).unwrap();
    assert_eq!(found.len(), 25);
}

#[test]
fn backfill_sender_updates_null_rows() {
    let db = Database::open_in_memory().unwrap();
    let mut row = payment("tx1", 100, 0, "tADDR1", 1.0, 1_000);
    row.from_address = None;
    db.insert_batch(&[block(100, 1_000)], &[row]).unwrap();

    let unresolved = db.unresolved_transactions(10).unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].tx_hash, "tx1");

    let updated = db.backfill_sender("tx1", 100, 0, "tNEWSENDER").unwrap();
    assert_eq!(updated, 1);
    assert!(db.unresolved_transactions(10).unwrap().is_empty());

    let (page, _) = db.transactions_page(Some("tADDR1"), 1, 10, None).unwrap();
    assert_eq!(page[0].from_address.as_deref(), Some("tNEWSENDER"));
}

#[test]
fn snapshot_tolerance_window_dedupes() {
    let db = Database::open_in_memory().unwrap();
    let row = NodeStatsRow {
        timestamp: 10_000,
        total_nodes: 12_000,
        cumulus: 8_000,
        nimbus: 3_000,
        stratus: 1_000,
        arcane_nodes: 6_000,
        data_source: "api".to_string(),
        api_success_rate: 100.0,
        note: None,
    };
    db.insert_node_stats(&row).unwrap();

    assert!(db.node_stats_exist_within(10_000, 3_600).unwrap());
    assert!(db.node_stats_exist_within(13_000, 3_600).unwrap());
    assert!(!db.node_stats_exist_within(14_000, 3_600).unwrap());
    assert!(!db.utilization_stats_exist_within(10_000, 3_600).unwrap());
}
