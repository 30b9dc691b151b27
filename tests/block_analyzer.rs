use fluxtracker::block_analyzer::{analyze_block, SenderRef};
use fluxtracker::chain_client::{ChainBlock, ChainTx, ScriptPubKey, TxInput, TxOutput};
use std::collections::HashSet;

fn watched(addresses: &[&str]) -> HashSet<String> {
    addresses.iter().map(|a| a.to_string()).collect()
}

fn output(value: f64, addresses: &[&str]) -> TxOutput {
    TxOutput {
        value,
        addresses: Some(addresses.iter().map(|a| a.to_string()).collect()),
        script_pub_key: None,
    }
}

fn plain_input(txid: &str, vout: u32) -> TxInput {
    TxInput {
        coinbase: None,
        txid: Some(txid.to_string()),
        vout: Some(vout),
        addr: None,
    }
}

fn block(height: u64, time: i64, tx: Vec<ChainTx>) -> ChainBlock {
    ChainBlock {
        height,
        hash: format!("hash{}", height),
        time,
        confirmations: 10,
        tx,
    }
}

#[test]
fn extracts_single_payment_to_watched_address() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("prev", 0)],
        vout: vec![
            output(1.25, &["tADDR1"]),
            output(0.0, &["tOTHER"]),
        ],
    };
    let block = block(1_500, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1"]));

    assert_eq!(payments.len(), 1);
    let payment = &payments[0];
    assert_eq!(payment.block_height, 1_500);
    assert_eq!(payment.address, "tADDR1");
    assert_eq!(payment.vout_index, 0);
    assert_eq!(payment.value, 1.25);
    assert_eq!(payment.timestamp, 1_700_000_000);
}

#[test]
fn unresolved_sender_carries_previous_output_reference() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("A", 2)],
        vout: vec![output(5.0, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1"]));

    assert_eq!(payments.len(), 1);
    assert_eq!(
        payments[0].from,
        SenderRef::Unresolved {
            txid: "A".to_string(),
            vout: 2
        }
    );
}

#[test]
fn inline_input_address_wins_over_reference() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![TxInput {
            coinbase: None,
            txid: Some("A".to_string()),
            vout: Some(0),
            addr: Some("tSENDER".to_string()),
        }],
        vout: vec![output(2.0, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1"]));
    assert_eq!(payments[0].from, SenderRef::Inline("tSENDER".to_string()));
}

#[test]
fn input_without_address_or_reference_is_unknown() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![TxInput {
            coinbase: None,
            txid: None,
            vout: None,
            addr: None,
        }],
        vout: vec![output(2.0, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1"]));
    assert_eq!(payments[0].from, SenderRef::Unknown);
}

#[test]
fn coinbase_transactions_are_skipped() {
    let coinbase = ChainTx {
        txid: "cb".to_string(),
        vin: vec![TxInput {
            coinbase: Some("03abcdef".to_string()),
            txid: None,
            vout: None,
            addr: None,
        }],
        vout: vec![output(37.5, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![coinbase]);

    assert!(analyze_block(&block, &watched(&["tADDR1"])).is_empty());
}

#[test]
fn empty_watch_set_emits_nothing() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("prev", 0)],
        vout: vec![output(1.0, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    assert!(analyze_block(&block, &HashSet::new()).is_empty());
}

#[test]
fn multiple_outputs_and_addresses_emit_one_record_each() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("prev", 0)],
        vout: vec![
            output(1.0, &["tADDR1"]),
            output(2.0, &["tADDR2", "tADDR1"]),
            output(3.0, &["tELSE"]),
        ],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1", "tADDR2"]));

    assert_eq!(payments.len(), 3);
    assert_eq!(payments[0].vout_index, 0);
    assert_eq!(payments[0].address, "tADDR1");
    assert_eq!(payments[1].vout_index, 1);
    assert_eq!(payments[1].address, "tADDR2");
    assert_eq!(payments[2].vout_index, 1);
    assert_eq!(payments[2].address, "tADDR1");
}

#[test]
fn script_pub_key_addresses_are_recognized() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("prev", 0)],
        vout: vec![TxOutput {
            value: 4.0,
            addresses: None,
            script_pub_key: Some(ScriptPubKey {
                addresses: Some(vec!["tADDR1".to_string()]),
            }),
        }],
    };
    let block = block(100, 1_700_000_000, vec![tx]);

    let payments = analyze_block(&block, &watched(&["tADDR1"]));
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].value, 4.0);
}

#[test]
fn analysis_is_deterministic() {
    let tx = ChainTx {
        txid: "tx1".to_string(),
        vin: vec![plain_input("prev", 1)],
        vout: vec![output(1.0, &["tADDR1"]), output(2.0, &["tADDR1"])],
    };
    let block = block(100, 1_700_000_000, vec![tx]);
    let watch = watched(&["tADDR1"]);

    assert_eq!(analyze_block(&block, &watch), analyze_block(&block, &watch));
}
