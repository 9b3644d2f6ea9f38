//! Short random record IDs

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of generated record IDs (62^10 possibilities)
pub const ID_LEN: usize = 10;

/// Generate a short random alphanumeric token
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
