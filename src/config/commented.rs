//! Support for self-documenting configuration values.
//!
//! Any value in the configuration document may either be written plainly or
//! wrapped together with an explanation for human readers:
//!
//! ```yaml
//! globalBoard:
//!   //explanation: Every issue lands here regardless of labels
//!   value:
//!     githubBoardId: PVT_kwDOA
//! ```
//!
//! Fields opt in with `#[serde(deserialize_with = "commented")]`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeCommented<T> {
    Commented {
        #[serde(rename = "//explanation")]
        #[allow(dead_code)]
        explanation: String,
        value: T,
    },
    Plain(T),
}

/// Deserializes a value that may be wrapped in an `{ "//explanation", value }`
/// envelope.
pub fn commented<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match MaybeCommented::deserialize(deserializer)? {
        MaybeCommented::Commented { value, .. } => value,
        MaybeCommented::Plain(value) => value,
    })
}
