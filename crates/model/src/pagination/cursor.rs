use serde::{Deserialize, Serialize};

/// Position of the next request in a paginated upstream listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// First request of an endpoint that has no explicit paging parameters.
    Start,

    /// Offset/limit paging.
    Offset { offset: usize, limit: usize },

    /// Opaque continuation token handed back by the upstream.
    Token(String),
}

impl Cursor {
    pub fn first_offset(limit: usize) -> Self {
        Cursor::Offset { offset: 0, limit }
    }

    pub fn offset(&self) -> usize {
        match self {
            Cursor::Offset { offset, .. } => *offset,
            _ => 0,
        }
    }

    /// Next offset cursor when a page came back full, `None` otherwise.
    pub fn after_page(&self, returned: usize) -> Option<Cursor> {
        match self {
            Cursor::Offset { offset, limit } if returned >= *limit && *limit > 0 => {
                Some(Cursor::Offset {
                    offset: offset + limit,
                    limit: *limit,
                })
            }
            _ => None,
        }
    }

    /// Cursor of the following page when it can be derived without the
    /// current page's payload. Token cursors cannot.
    pub fn following(&self) -> Option<Cursor> {
        match self {
            Cursor::Offset { offset, limit } if *limit > 0 => Some(Cursor::Offset {
                offset: offset + limit,
                limit: *limit,
            }),
            _ => None,
        }
    }
}
