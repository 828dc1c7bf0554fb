//! Transaction-level classification for batch history imports.
//!
//! History APIs return each transaction with its logs already ABI-decoded
//! into named events. One transaction usually emits several events (a swap
//! also emits transfers); classification keeps only the dominant kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One ABI-decoded log event attached to a history transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedLogEvent {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<DecodedParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedParam {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Classified transaction. Missing payload fields stay `None`; absence of
/// data is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transaction_type")]
pub enum DecodedTransaction {
    #[serde(rename = "Token Swap")]
    Swap {
        hash: String,
        amount_in: Option<String>,
        amount_out: Option<String>,
    },
    #[serde(rename = "Token Approval")]
    Approval {
        hash: String,
        owner: Option<String>,
        spender: Option<String>,
        amount: Option<String>,
    },
    #[serde(rename = "Token Transfer")]
    Transfer {
        hash: String,
        sender: Option<String>,
        recipient: Option<String>,
        amount: Option<String>,
    },
    #[serde(rename = "Token Deposit")]
    Deposit { hash: String, amount: Option<String> },
    #[serde(rename = "Unknown")]
    Unknown { hash: String },
}

/// First match wins: a transaction carrying both a Swap and a Transfer event
/// is a Swap.
const PRECEDENCE: [&str; 4] = ["Swap", "Approval", "Transfer", "Deposit"];

/// Classify one transaction from its decoded log events.
///
/// Events are grouped by name (a duplicate name keeps the last occurrence),
/// then matched against the precedence order. Anything unmatched becomes
/// `Unknown` carrying only the hash.
pub fn classify_transaction(hash: &str, events: &[DecodedLogEvent]) -> DecodedTransaction {
    let mut by_name: HashMap<&str, &DecodedLogEvent> = HashMap::new();
    for event in events {
        by_name.insert(event.name.as_str(), event);
    }

    for kind in PRECEDENCE {
        let Some(event) = by_name.get(kind) else {
            continue;
        };
        return match kind {
            "Swap" => DecodedTransaction::Swap {
                hash: hash.to_string(),
                amount_in: input(event, "amount1"),
                amount_out: input(event, "amount0"),
            },
            "Approval" => DecodedTransaction::Approval {
                hash: hash.to_string(),
                owner: input(event, "owner"),
                spender: input(event, "spender"),
                amount: input(event, "value"),
            },
            "Transfer" => DecodedTransaction::Transfer {
                hash: hash.to_string(),
                sender: input(event, "sender"),
                recipient: input(event, "recipient"),
                amount: input(event, "amount"),
            },
            "Deposit" => DecodedTransaction::Deposit {
                hash: hash.to_string(),
                amount: input(event, "amount"),
            },
            _ => unreachable!(),
        };
    }

    DecodedTransaction::Unknown {
        hash: hash.to_string(),
    }
}

/// Fetch a named input's value as a string; numbers are stringified the way
/// the upstream API renders uint256 values.
fn input(event: &DecodedLogEvent, name: &str) -> Option<String> {
    let value = event
        .inputs
        .iter()
        .find(|p| p.name == name)?
        .value
        .as_ref()?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
