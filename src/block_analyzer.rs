/// Payment extraction over fetched block bodies.
///
/// Pure and deterministic: analyzing the same block against the same watch
/// set always yields the same records, in output order.
use crate::chain_client::{ChainBlock, ChainTx};
use std::collections::HashSet;

/// Provisional sender attached to a payment before persistence.
///
/// `Unresolved` carries the previous-output reference the sync engine later
/// resolves through the chain client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderRef {
    Inline(String),
    Unresolved { txid: String, vout: u32 },
    Unknown,
}

impl SenderRef {
    /// The string persisted to the store, or None while still unresolved.
    pub fn as_stored(&self) -> Option<String> {
        match self {
            SenderRef::Inline(address) => Some(address.clone()),
            SenderRef::Unresolved { .. } => None,
            SenderRef::Unknown => Some("Unknown".to_string()),
        }
    }
}

/// One output paying a watched address.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub block_height: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub vout_index: u32,
    pub address: String,
    pub value: f64,
    pub timestamp: i64,
    pub confirmations: i64,
    pub from: SenderRef,
}

/// Extract every payment to a watched address from one block.
///
/// Coinbase transactions are skipped. A transaction with several matching
/// outputs, or an output paying several watched addresses, emits one record
/// per `(output, address)` pair.
pub fn analyze_block(block: &ChainBlock, watched: &HashSet<String>) -> Vec<Payment> {
    let mut payments = Vec::new();
    if watched.is_empty() {
        return payments;
    }

    for tx in &block.tx {
        if is_coinbase(tx) {
            continue;
        }

        let mut matched_any = false;
        let mut tx_payments = Vec::new();
        for (vout_index, output) in tx.vout.iter().enumerate() {
            for address in output.recipient_addresses() {
                if watched.contains(address) {
                    matched_any = true;
                    tx_payments.push(Payment {
                        block_height: block.height,
                        block_hash: block.hash.clone(),
                        tx_hash: tx.txid.clone(),
                        vout_index: vout_index as u32,
                        address: address.clone(),
                        value: output.value,
                        timestamp: block.time,
                        confirmations: block.confirmations,
                        from: SenderRef::Unknown,
                    });
                }
            }
        }

        if matched_any {
            let sender = provisional_sender(tx);
            for payment in &mut tx_payments {
                payment.from = sender.clone();
            }
            payments.append(&mut tx_payments);
        }
    }

    payments
}

fn is_coinbase(tx: &ChainTx) -> bool {
    tx.vin.first().map(|vin| vin.coinbase.is_some()).unwrap_or(false)
}

/// Sender as far as the block body alone can tell.
fn provisional_sender(tx: &ChainTx) -> SenderRef {
    match tx.vin.first() {
        Some(vin) => {
            if let Some(address) = &vin.addr {
                SenderRef::Inline(address.clone())
            } else if let (Some(txid), Some(vout)) = (&vin.txid, vin.vout) {
                SenderRef::Unresolved {
                    txid: txid.clone(),
                    vout,
                }
            } else {
                SenderRef::Unknown
            }
        }
        None => SenderRef::Unknown,
    }
}
