use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream identifier tuple used by multi-identifier requests.
///
/// Most endpoints take a single id (advert id, product id); a few take a
/// pair such as `(advert_id, nm_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(Vec<i64>);

impl Identifier {
    pub fn single(id: i64) -> Self {
        Self(vec![id])
    }

    pub fn pair(first: i64, second: i64) -> Self {
        Self(vec![first, second])
    }

    pub fn from_parts(parts: Vec<i64>) -> Self {
        Self(parts)
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.0.get(index).copied()
    }

    pub fn first(&self) -> Option<i64> {
        self.get(0)
    }

    pub fn parts(&self) -> &[i64] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(i64::to_string).collect();
        write!(f, "{}", parts.join(":"))
    }
}
