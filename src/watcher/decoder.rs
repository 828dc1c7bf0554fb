use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;

use super::types::TokenMeta;

// Typed Transfer binding; gives us SIGNATURE_HASH for topic matching.
sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Transfer decoded from a single log, amount still in raw token units.
#[derive(Debug, Clone)]
pub struct DecodedTransfer {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: BigDecimal,
    pub symbol: String,
    pub decimals: u8,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Attempt to decode a log as an ERC-20 Transfer from a watched token.
///
/// Returns `None` when the contract is untracked, the signature does not
/// match, or the topic/data bytes are too short. Malformed logs are dropped,
/// never errors; the listener loop keeps running.
pub fn decode_transfer_log(
    log: &Log,
    watched: &HashMap<Address, TokenMeta>,
) -> Option<DecodedTransfer> {
    let inner = &log.inner;
    let meta = watched.get(&inner.address)?;

    let topics = inner.data.topics();
    if topics.is_empty() || topics[0] != Transfer::SIGNATURE_HASH {
        return None;
    }
    // Signature + indexed from + indexed to.
    if topics.len() != 3 {
        return None;
    }

    let from = Address::from_word(topics[1]);
    let to = Address::from_word(topics[2]);

    let data = inner.data.data.as_ref();
    if data.len() < 32 {
        return None;
    }
    let value = U256::from_be_slice(&data[..32]);
    let amount = BigDecimal::from_str(&value.to_string()).ok()?;

    Some(DecodedTransfer {
        token: inner.address,
        from,
        to,
        amount,
        symbol: meta.symbol.clone(),
        decimals: meta.decimals,
        tx_hash: log.transaction_hash.unwrap_or_default(),
        block_number: log.block_number.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn token() -> Address {
        Address::repeat_byte(0x11)
    }

    fn watched() -> HashMap<Address, TokenMeta> {
        let mut map = HashMap::new();
        map.insert(
            token(),
            TokenMeta {
                symbol: "MNT".to_string(),
                decimals: 18,
            },
        );
        map
    }

    fn make_log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            transaction_hash: Some(B256::repeat_byte(0xaa)),
            block_number: Some(4242),
            ..Default::default()
        }
    }

    fn transfer_log(value: U256) -> Log {
        let from = Address::repeat_byte(0x22);
        let to = Address::repeat_byte(0x33);
        make_log(
            token(),
            vec![Transfer::SIGNATURE_HASH, from.into_word(), to.into_word()],
            value.to_be_bytes::<32>().to_vec(),
        )
    }

    #[test]
    fn test_decodes_valid_transfer() {
        let decoded = decode_transfer_log(&transfer_log(U256::from(5_000u64)), &watched())
            .expect("should decode");
        assert_eq!(decoded.symbol, "MNT");
        assert_eq!(decoded.from, Address::repeat_byte(0x22));
        assert_eq!(decoded.to, Address::repeat_byte(0x33));
        assert_eq!(decoded.amount, BigDecimal::from(5_000u64));
        assert_eq!(decoded.block_number, 4242);
    }

    #[test]
    fn test_ignores_untracked_contract() {
        let mut log = transfer_log(U256::from(1u64));
        log.inner.address = Address::repeat_byte(0x99);
        assert!(decode_transfer_log(&log, &watched()).is_none());
    }

    #[test]
    fn test_ignores_wrong_signature() {
        let log = make_log(
            token(),
            vec![
                B256::repeat_byte(0x01),
                Address::repeat_byte(0x22).into_word(),
                Address::repeat_byte(0x33).into_word(),
            ],
            U256::from(1u64).to_be_bytes::<32>().to_vec(),
        );
        assert!(decode_transfer_log(&log, &watched()).is_none());
    }

    #[test]
    fn test_ignores_missing_topics() {
        let log = make_log(
            token(),
            vec![Transfer::SIGNATURE_HASH, Address::repeat_byte(0x22).into_word()],
            U256::from(1u64).to_be_bytes::<32>().to_vec(),
        );
        assert!(decode_transfer_log(&log, &watched()).is_none());
    }

    #[test]
    fn test_ignores_short_data() {
        let log = make_log(
            token(),
            vec![
                Transfer::SIGNATURE_HASH,
                Address::repeat_byte(0x22).into_word(),
                Address::repeat_byte(0x33).into_word(),
            ],
            vec![0u8; 12],
        );
        assert!(decode_transfer_log(&log, &watched()).is_none());
    }

    #[test]
    fn test_malformed_log_does_not_stop_the_batch() {
        let bad = make_log(token(), vec![Transfer::SIGNATURE_HASH], vec![]);
        let good = transfer_log(U256::from(7u64));
        let decoded: Vec<_> = [bad, good]
            .iter()
            .filter_map(|log| decode_transfer_log(log, &watched()))
            .collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].amount, BigDecimal::from(7u64));
    }
}
