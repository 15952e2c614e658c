//! Directory configuration
//!
//! Native callers load it from JSON; the zome reads it from DNA properties.
//! Missing keys take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Recompute and persist the average when a doctor's detail is read
    pub heal_on_read: bool,
    /// Treat listings created by a doctor-role identity as verified when no
    /// explicit claim exists
    pub implicit_creator_verification: bool,
    pub max_comment_length: usize,
    pub max_response_length: usize,
    /// Limit for short text fields (names, hospital, address lines)
    pub max_text_length: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            heal_on_read: true,
            implicit_creator_verification: true,
            max_comment_length: 2000,
            max_response_length: 2000,
            max_text_length: 200,
        }
    }
}

impl DirectoryConfig {
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        serde_json::from_str(json)
            .map_err(|e| DirectoryError::Validation(format!("Invalid directory config: {}", e)))
    }
}
