//! Per-request collaborators: who is asking, which page of results, and what
//! API values an unknown field name may refer to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{RoleId, Scalar};

/// Supplies the acting identity's roles.
pub trait IdentityProvider: Send + Sync {
    /// Role ids held by the identity.
    fn roles(&self) -> Vec<RoleId>;

    /// Returns true if the identity bypasses access control.
    fn is_privileged(&self) -> bool;
}

/// A plain identity value.
///
/// # Examples
///
/// ```
/// use folio_selector::core::{AccessIdentity, IdentityProvider};
///
/// let guest = AccessIdentity::guest();
/// assert!(guest.roles().is_empty());
///
/// let editor = AccessIdentity::with_roles([3, 7]);
/// assert!(!editor.is_privileged());
///
/// assert!(AccessIdentity::superuser().is_privileged());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentity {
    /// Role ids.
    pub roles: Vec<RoleId>,
    /// Bypasses access control.
    pub privileged: bool,
}

impl AccessIdentity {
    /// An anonymous visitor with no roles.
    pub fn guest() -> Self {
        Self::default()
    }

    /// An identity holding the given roles.
    pub fn with_roles(roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            privileged: false,
        }
    }

    /// An identity that bypasses access control.
    pub fn superuser() -> Self {
        Self {
            roles: Vec::new(),
            privileged: true,
        }
    }
}

impl IdentityProvider for AccessIdentity {
    fn roles(&self) -> Vec<RoleId> {
        self.roles.clone()
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}

/// Supplies the current page number of a paginated listing.
pub trait PaginationContext: Send + Sync {
    /// One-based page number.
    fn page_number(&self) -> u32;
}

impl PaginationContext for u32 {
    fn page_number(&self) -> u32 {
        (*self).max(1)
    }
}

/// Values an unknown field name may be bound to.
pub trait ApiBindings: Send + Sync {
    /// Looks up `name`, or `name.subfield` when a subfield is given.
    fn lookup(&self, name: &str, subfield: Option<&str>) -> Option<Scalar>;
}

/// No bindings at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBindings;

impl ApiBindings for NoBindings {
    fn lookup(&self, _name: &str, _subfield: Option<&str>) -> Option<Scalar> {
        None
    }
}

impl ApiBindings for HashMap<String, Scalar> {
    fn lookup(&self, name: &str, subfield: Option<&str>) -> Option<Scalar> {
        match subfield {
            Some(subfield) => self.get(&format!("{}.{}", name, subfield)).cloned(),
            None => self.get(name).cloned(),
        }
    }
}

/// Everything a compile call needs to know about the request.
#[derive(Clone)]
pub struct RequestContext {
    identity: Arc<dyn IdentityProvider>,
    pagination: Arc<dyn PaginationContext>,
    bindings: Arc<dyn ApiBindings>,
}

impl RequestContext {
    /// A context for the given identity on page 1 with no bindings.
    pub fn new(identity: impl IdentityProvider + 'static) -> Self {
        Self {
            identity: Arc::new(identity),
            pagination: Arc::new(1u32),
            bindings: Arc::new(NoBindings),
        }
    }

    /// A guest context.
    pub fn guest() -> Self {
        Self::new(AccessIdentity::guest())
    }

    /// A superuser context.
    pub fn superuser() -> Self {
        Self::new(AccessIdentity::superuser())
    }

    /// Sets the pagination source.
    pub fn with_pagination(mut self, pagination: impl PaginationContext + 'static) -> Self {
        self.pagination = Arc::new(pagination);
        self
    }

    /// Sets the page number.
    pub fn with_page_number(self, page: u32) -> Self {
        self.with_pagination(page)
    }

    /// Sets the API bindings.
    pub fn with_bindings(mut self, bindings: impl ApiBindings + 'static) -> Self {
        self.bindings = Arc::new(bindings);
        self
    }

    /// The acting identity.
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    /// The API bindings.
    pub fn bindings(&self) -> &dyn ApiBindings {
        self.bindings.as_ref()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::guest()
    }
}

impl PaginationContext for RequestContext {
    fn page_number(&self) -> u32 {
        self.pagination.page_number().max(1)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("roles", &self.identity.roles())
            .field("privileged", &self.identity.is_privileged())
            .field("page_number", &self.page_number())
            .finish()
    }
}
