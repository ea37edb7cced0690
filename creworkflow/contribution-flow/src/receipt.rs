use ethers::types::{Address, H256, Log, U256};
use ethers::utils::keccak256;

use crate::models::RegistrationReceipt;

pub const FILE_ADDED_EVENT: &str = "FileAdded(uint256,address,string)";

pub fn file_added_topic() -> H256 {
    H256::from(keccak256(FILE_ADDED_EVENT.as_bytes()))
}

pub fn extract_file_id(receipt: &RegistrationReceipt) -> Option<u64> {
    extract_file_id_from(receipt, None)
}

/// Finds the first `FileAdded` log (optionally emitted by `registry`) and decodes its file id.
/// Ids that do not fit in a `u64` are treated as missing.
pub fn extract_file_id_from(receipt: &RegistrationReceipt, registry: Option<Address>) -> Option<u64> {
    let topic = file_added_topic();
    receipt
        .logs
        .iter()
        .filter(|log| registry.map_or(true, |addr| log.address == addr))
        .filter(|log| log.topics.first() == Some(&topic))
        .find_map(decode_file_id)
}

fn decode_file_id(log: &Log) -> Option<u64> {
    let value = match log.topics.get(1) {
        Some(indexed) => U256::from_big_endian(indexed.as_bytes()),
        // older registry deployments emit the id as the first data word
        None if log.data.len() >= 32 => U256::from_big_endian(&log.data[..32]),
        None => return None,
    };
    if value > U256::from(u64::MAX) {
        return None;
    }
    Some(value.as_u64())
}
