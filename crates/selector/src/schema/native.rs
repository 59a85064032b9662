//! Classification of selector field names.
//!
//! Every field path is one of: a directive consumed by the compiler, a native
//! column of `pages`, a virtual attribute with no column, or a custom field
//! looked up in the registry.

use std::fmt;

/// Directives that steer the compile rather than filter pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `sort=`
    Sort,
    /// `limit=`
    Limit,
    /// `start=`
    Start,
    /// `include=hidden|unpublished|trash|all`
    Include,
    /// `check_access=0|1`
    CheckAccess,
}

/// What a native column holds, which decides value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Plain integer.
    Integer,
    /// Plain text.
    Text,
    /// Date stored as `YYYY-MM-DD HH:MM:SS`.
    Datetime,
    /// Status bitmask; accepts status names.
    Status,
    /// Template id; accepts template names.
    Template,
    /// Parent id; accepts paths and sub-selectors.
    Parent,
}

/// Columns of the `pages` table usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeColumn {
    /// `id`
    Id,
    /// `name`
    Name,
    /// `status`
    Status,
    /// `templates_id`
    Template,
    /// `parent_id`
    Parent,
    /// `sort`, only reachable from sort tokens since `sort=` is a directive.
    Sort,
    /// `created`
    Created,
    /// `modified`
    Modified,
    /// `published`
    Published,
    /// `created_users_id`
    CreatedUser,
    /// `modified_users_id`
    ModifiedUser,
}

impl NativeColumn {
    /// Looks up a native column by selector name.
    pub fn from_name(name: &str) -> Option<Self> {
        let column = match name {
            "id" => NativeColumn::Id,
            "name" => NativeColumn::Name,
            "status" => NativeColumn::Status,
            "template" | "templates_id" => NativeColumn::Template,
            "parent" | "parent_id" => NativeColumn::Parent,
            "created" => NativeColumn::Created,
            "modified" => NativeColumn::Modified,
            "published" => NativeColumn::Published,
            "created_users_id" | "createdUser" | "created_user" => NativeColumn::CreatedUser,
            "modified_users_id" | "modifiedUser" | "modified_user" => NativeColumn::ModifiedUser,
            _ => return None,
        };
        Some(column)
    }

    /// The column name in `pages`.
    pub fn column(&self) -> &'static str {
        match self {
            NativeColumn::Id => "id",
            NativeColumn::Name => "name",
            NativeColumn::Status => "status",
            NativeColumn::Template => "templates_id",
            NativeColumn::Parent => "parent_id",
            NativeColumn::Sort => "sort",
            NativeColumn::Created => "created",
            NativeColumn::Modified => "modified",
            NativeColumn::Published => "published",
            NativeColumn::CreatedUser => "created_users_id",
            NativeColumn::ModifiedUser => "modified_users_id",
        }
    }

    /// How values for this column are coerced.
    pub fn kind(&self) -> ColumnKind {
        match self {
            NativeColumn::Id
            | NativeColumn::Sort
            | NativeColumn::CreatedUser
            | NativeColumn::ModifiedUser => ColumnKind::Integer,
            NativeColumn::Name => ColumnKind::Text,
            NativeColumn::Status => ColumnKind::Status,
            NativeColumn::Template => ColumnKind::Template,
            NativeColumn::Parent => ColumnKind::Parent,
            NativeColumn::Created | NativeColumn::Modified | NativeColumn::Published => {
                ColumnKind::Datetime
            }
        }
    }
}

/// Attributes computed from other tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualAttribute {
    /// The page's URL path, `/about/team/`.
    Path,
    /// Ancestor membership through `pages_parents`.
    HasParent,
    /// Number of direct children.
    NumChildren,
}

impl VirtualAttribute {
    /// Looks up a virtual attribute by selector name.
    pub fn from_name(name: &str) -> Option<Self> {
        let attribute = match name {
            "path" | "url" => VirtualAttribute::Path,
            "has_parent" | "hasParent" => VirtualAttribute::HasParent,
            "num_children" | "numChildren" | "children.count" => VirtualAttribute::NumChildren,
            _ => return None,
        };
        Some(attribute)
    }
}

/// How the compiler handles a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A compile directive.
    Directive(Directive),
    /// A column of `pages`.
    Native(NativeColumn),
    /// A computed attribute.
    Virtual(VirtualAttribute),
    /// Anything else: a registered field, or unknown.
    Custom,
}

impl Classification {
    /// Short label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Directive(_) => "directive",
            Classification::Native(_) => "native",
            Classification::Virtual(_) => "virtual",
            Classification::Custom => "custom",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a field path such as `title`, `parent.name` or `children.count`.
///
/// Only the part before the first dot decides, except for `children.count`.
pub fn classify(path: &str) -> Classification {
    if let Some(attribute) = VirtualAttribute::from_name(path) {
        return Classification::Virtual(attribute);
    }

    let head = path.split('.').next().unwrap_or(path);
    match head {
        "sort" => return Classification::Directive(Directive::Sort),
        "limit" => return Classification::Directive(Directive::Limit),
        "start" => return Classification::Directive(Directive::Start),
        "include" => return Classification::Directive(Directive::Include),
        "check_access" | "checkAccess" => {
            return Classification::Directive(Directive::CheckAccess);
        }
        _ => {}
    }

    if let Some(attribute) = VirtualAttribute::from_name(head) {
        return Classification::Virtual(attribute);
    }
    if let Some(column) = NativeColumn::from_name(head) {
        return Classification::Native(column);
    }
    Classification::Custom
}

/// Splits `field.subfield` into its parts.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((field, subfield)) => (field, Some(subfield)),
        None => (path, None),
    }
}
