//! Client-over-default resolution shared by routing policies and template
//! mappings.
//!
//! A lookup is run for the client scope first. A non-empty result fully
//! shadows the default scope (`client_id = NULL`); there is no merging.

#![allow(async_fn_in_trait)]

use crate::error::OutboundError;

/// Which scope level produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Client,
    Default,
}

/// One scoped query. `client_id = None` selects the default rows only.
pub trait ScopedLookup {
    type Item;

    async fn lookup(&self, client_id: Option<&str>) -> Result<Vec<Self::Item>, OutboundError>;
}

#[derive(Debug)]
pub struct Scoped<T> {
    pub scope: Scope,
    pub items: Vec<T>,
}

impl<T> Scoped<T> {
    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }
}

pub async fn resolve_scoped<L: ScopedLookup>(
    lookup: &L,
    client_id: Option<&str>,
) -> Result<Scoped<L::Item>, OutboundError> {
    if let Some(client_id) = client_id {
        let items = lookup.lookup(Some(client_id)).await?;
        if !items.is_empty() {
            return Ok(Scoped {
                scope: Scope::Client,
                items,
            });
        }
    }
    let items = lookup.lookup(None).await?;
    Ok(Scoped {
        scope: Scope::Default,
        items,
    })
}
