//! Per-call tenant context and table routing.
//!
//! The tenant namespace is threaded through every operation as an explicit
//! parameter and resolved exactly once per call into a physical table name.
//! Resolution is a pure function of `(prefix, context)` with no side
//! effects; the namespace-to-table mapping is the sole isolation mechanism
//! between tenants.

use std::fmt;
use std::sync::Arc;

use crate::types::{Namespace, TableName, TablePrefix};

/// The caller's execution context for one store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    namespace: Namespace,
}

impl RequestContext {
    /// Creates a context for the given tenant namespace.
    pub const fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    /// The tenant namespace this call runs under.
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Namespace::default_namespace())
    }
}

/// Strategy for resolving a physical table name from the table prefix and
/// the caller's context.
#[derive(Clone)]
pub enum TableNaming {
    /// `prefix_namespace`, one table per tenant. The default.
    NamespaceSuffix,
    /// The bare prefix with no namespace suffix; all tenants share a table.
    BarePrefix,
    /// A caller-supplied naming function.
    Custom(Arc<dyn Fn(&TablePrefix, &RequestContext) -> TableName + Send + Sync>),
}

impl TableNaming {
    /// Resolves the table name for one call.
    pub fn resolve(&self, prefix: &TablePrefix, ctx: &RequestContext) -> TableName {
        match self {
            Self::NamespaceSuffix => {
                TableName::try_new(format!("{}_{}", prefix, ctx.namespace()))
                    .expect("prefix and namespace are non-empty")
            }
            Self::BarePrefix => TableName::try_new(prefix.as_ref())
                .expect("prefix is non-empty"),
            Self::Custom(naming) => naming(prefix, ctx),
        }
    }
}

impl fmt::Debug for TableNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamespaceSuffix => f.write_str("NamespaceSuffix"),
            Self::BarePrefix => f.write_str("BarePrefix"),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl Default for TableNaming {
    fn default() -> Self {
        Self::NamespaceSuffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> TablePrefix {
        TablePrefix::try_new("events").unwrap()
    }

    #[test]
    fn namespace_suffix_joins_with_underscore() {
        let ctx = RequestContext::new(Namespace::try_new("tenant-a").unwrap());
        let table = TableNaming::NamespaceSuffix.resolve(&prefix(), &ctx);
        assert_eq!(table.as_ref(), "events_tenant-a");
    }

    #[test]
    fn default_context_uses_default_namespace() {
        let table = TableNaming::NamespaceSuffix.resolve(&prefix(), &RequestContext::default());
        assert_eq!(table.as_ref(), "events_default");
    }

    #[test]
    fn bare_prefix_ignores_namespace() {
        let ctx = RequestContext::new(Namespace::try_new("tenant-a").unwrap());
        let table = TableNaming::BarePrefix.resolve(&prefix(), &ctx);
        assert_eq!(table.as_ref(), "events");
    }

    #[test]
    fn custom_naming_overrides_everything() {
        let naming = TableNaming::Custom(Arc::new(|prefix, ctx| {
            TableName::try_new(format!("{}-{}-v2", prefix, ctx.namespace())).unwrap()
        }));
        let ctx = RequestContext::new(Namespace::try_new("tenant-a").unwrap());
        assert_eq!(naming.resolve(&prefix(), &ctx).as_ref(), "events-tenant-a-v2");
    }
}
