//! Doctor Directory Shared Utilities
//!
//! Common functionality for the doctor directory zomes:
//! - Anchor management
//! - Conversion between DHT hashes and directory ids
//! - Conversion between `Timestamp` and `chrono` time
//! - Following update links to the newest version of an entry
//! - Mapping directory errors into `WasmError`

use hdk::prelude::*;
use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use anchors::*;
pub use batch::*;
pub use errors::*;
pub use ids::*;
pub use time::*;

pub mod anchors {
    use super::*;

    pub const ALL_DOCTORS_ANCHOR: &str = "all_doctors";

    /// Standard anchor entry type
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Anchor(pub String);

    /// Get the entry hash for an anchor by hashing the serialized bytes
    pub fn anchor_hash(anchor_text: &str) -> ExternResult<EntryHash> {
        let anchor = Anchor(anchor_text.to_string());
        let bytes = serde_json::to_vec(&anchor)
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(
                format!("Failed to serialize anchor: {}", e)
            )))?;

        let entry = Entry::App(AppEntryBytes::try_from(SerializedBytes::try_from(UnsafeBytes::from(bytes))
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(
                format!("Failed to create serialized bytes: {:?}", e)
            )))?)
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(
                format!("Failed to create app entry bytes: {:?}", e)
            )))?);

        hash_entry(entry)
    }

    pub fn all_doctors_anchor() -> ExternResult<EntryHash> {
        anchor_hash(ALL_DOCTORS_ANCHOR)
    }

    /// Anchor text for a specialty. Case and surrounding whitespace do not
    /// split the index.
    pub fn specialty_anchor_text(specialty: &str) -> String {
        format!("specialty_{}", specialty.trim().to_lowercase())
    }

    pub fn specialty_anchor(specialty: &str) -> ExternResult<EntryHash> {
        anchor_hash(&specialty_anchor_text(specialty))
    }
}

/// Directory ids are the base64 form of DHT hashes: a doctor, rating or
/// claim id is the hash of its original create action, an identity id is
/// the agent's public key.
pub mod ids {
    use super::*;
    use holo_hash::{ActionHashB64, AgentPubKeyB64};

    pub fn id_from_action(hash: &ActionHash) -> String {
        ActionHashB64::from(hash.clone()).to_string()
    }

    pub fn id_from_agent(agent: &AgentPubKey) -> String {
        AgentPubKeyB64::from(agent.clone()).to_string()
    }

    pub fn action_from_id(id: &str) -> ExternResult<ActionHash> {
        ActionHashB64::from_b64_str(id)
            .map(ActionHash::from)
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(
                format!("Invalid record id {}: {:?}", id, e)
            )))
    }

    pub fn agent_from_id(id: &str) -> ExternResult<AgentPubKey> {
        AgentPubKeyB64::from_b64_str(id)
            .map(AgentPubKey::from)
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(
                format!("Invalid identity id {}: {:?}", id, e)
            )))
    }
}

pub mod time {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Timestamps outside chrono's range collapse to the Unix epoch
    pub fn to_datetime(timestamp: Timestamp) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_micros(timestamp.as_micros()).unwrap_or_default()
    }

    pub fn to_timestamp(datetime: &DateTime<Utc>) -> Timestamp {
        Timestamp::from_micros(datetime.timestamp_micros())
    }
}

pub mod batch {
    use super::*;

    /// Newest update target linked from `original`, or `original` itself
    /// when the entry was never updated
    pub fn latest_action_hash(
        original: &ActionHash,
        update_links: impl TryInto<LinkTypeFilter, Error = WasmError>,
    ) -> ExternResult<ActionHash> {
        let links = get_links(
            LinkQuery::try_new(original.clone(), update_links)?, GetStrategy::default())?;

        Ok(links
            .into_iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp))
            .and_then(|link| link.target.into_action_hash())
            .unwrap_or_else(|| original.clone()))
    }

    /// Original create hashes targeted by `links`, duplicates removed,
    /// in link order
    pub fn link_targets(links: Vec<Link>) -> Vec<ActionHash> {
        let mut hashes: Vec<ActionHash> = Vec::with_capacity(links.len());
        for hash in links.into_iter().filter_map(|link| link.target.into_action_hash()) {
            if !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }
        hashes
    }

    /// Decode the app entry carried by `record`
    pub fn decode_entry<T>(record: &Record) -> ExternResult<Option<T>>
    where
        T: TryFrom<SerializedBytes, Error = SerializedBytesError>,
    {
        record
            .entry()
            .to_app_option::<T>()
            .map_err(|e| wasm_error!(WasmErrorInner::Guest(e.to_string())))
    }
}

pub mod errors {
    use super::*;
    use directory_core::{DirectoryError, StoreError};

    /// Surface a directory failure across the zome boundary
    pub trait IntoExternResult<T> {
        fn to_extern(self) -> ExternResult<T>;
    }

    impl<T> IntoExternResult<T> for Result<T, DirectoryError> {
        fn to_extern(self) -> ExternResult<T> {
            self.map_err(|err| wasm_error!(WasmErrorInner::Guest(err.to_string())))
        }
    }

    /// Host call failures are backend outages from the directory's view
    pub fn store_unavailable(err: WasmError) -> StoreError {
        StoreError::Unavailable(format!("{:?}", err))
    }
}
