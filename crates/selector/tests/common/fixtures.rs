//! Fixture site builder.
//!
//! A [`Site`] owns a registry, an in-memory executor with the schema
//! installed, and a compiler over both. Pages are inserted through
//! [`Site::add`], which keeps `pages_parents` and `pages_access` consistent
//! with the page tree the way the page store would.

use std::sync::Arc;

use parking_lot::RwLock;
use rusqlite::params;

use folio_selector::backends::sqlite::SqliteExecutor;
use folio_selector::core::{AccessIdentity, RequestContext};
use folio_selector::fieldtypes::{DatetimeField, IntegerField, PageRefField, TextField};
use folio_selector::schema::{FieldDefinition, RelationScope, SchemaRegistry, TemplateDefinition};
use folio_selector::types::{CompileOptions, CompileResult, PageId, Predicate, Status, TemplateId};
use folio_selector::{CompilerConfig, SelectorCompiler, SelectorResult};

/// Id of the home page.
pub const ROOT: PageId = 1;

/// Template ids of the fixture schema.
pub const HOME: TemplateId = 1;
pub const BASIC: TemplateId = 2;
pub const ARTICLE: TemplateId = 3;
pub const MEMBERS: TemplateId = 4;
pub const TAG: TemplateId = 5;

/// Role allowed to view `members` pages.
pub const MEMBER_ROLE: i64 = 7;

/// A page to insert.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub name: String,
    pub template: TemplateId,
    pub parent: PageId,
    pub status: u32,
    pub sort: i64,
    pub created: String,
}

impl PageSpec {
    /// A published page under the home page.
    pub fn new(name: &str, template: TemplateId) -> Self {
        Self {
            name: name.to_string(),
            template,
            parent: ROOT,
            status: Status::ON.bits(),
            sort: 0,
            created: "2024-01-01 00:00:00".to_string(),
        }
    }

    pub fn parent(mut self, parent: PageId) -> Self {
        self.parent = parent;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status.bits();
        self
    }

    pub fn sort(mut self, sort: i64) -> Self {
        self.sort = sort;
        self
    }

    pub fn created(mut self, created: &str) -> Self {
        self.created = created.to_string();
        self
    }
}

/// The fixture schema: templates `home`, `basic`, `article`, `members`
/// (role-restricted) and `tag`; fields `title`, `views`, `published_on` and
/// `tags` (references to `tag` pages).
pub fn fixture_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    for template in [
        TemplateDefinition::new(HOME, "home"),
        TemplateDefinition::new(BASIC, "basic"),
        TemplateDefinition::new(ARTICLE, "article"),
        TemplateDefinition::new(MEMBERS, "members").with_view_roles([MEMBER_ROLE]),
        TemplateDefinition::new(TAG, "tag"),
    ] {
        registry.register_template(template).expect("register template");
    }

    let fields = [
        FieldDefinition::new("title", Arc::new(TextField)).expect("title"),
        FieldDefinition::new("views", Arc::new(IntegerField)).expect("views"),
        FieldDefinition::new("published_on", Arc::new(DatetimeField)).expect("published_on"),
        FieldDefinition::new("tags", Arc::new(PageRefField))
            .expect("tags")
            .with_scope(RelationScope {
                template_ids: vec![TAG],
                parent_id: None,
            }),
    ];
    for field in fields {
        registry.register_field(field).expect("register field");
    }
    registry
}

/// A fixture site.
pub struct Site {
    pub executor: Arc<SqliteExecutor>,
    pub registry: Arc<RwLock<SchemaRegistry>>,
    pub compiler: SelectorCompiler,
}

impl Site {
    /// An in-memory site holding only the home page.
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        let executor = SqliteExecutor::in_memory().expect("in-memory executor");
        Self::build(executor, config)
    }

    /// A fresh site over an executor: installs the schema and the home page.
    pub fn build(executor: SqliteExecutor, config: CompilerConfig) -> Self {
        let site = Self::build_existing(executor, config);
        site.executor
            .connection()
            .expect("connection")
            .execute(
                "INSERT INTO pages (id, parent_id, templates_id, name, status) VALUES (?1, 0, ?2, 'home', 1)",
                params![ROOT, HOME],
            )
            .expect("insert home");
        site
    }

    /// A site over a database that may already hold pages.
    pub fn build_existing(executor: SqliteExecutor, config: CompilerConfig) -> Self {
        let registry = fixture_registry();
        executor.install_schema(&registry).expect("install schema");

        let executor = Arc::new(executor);
        let registry = Arc::new(RwLock::new(registry));
        let compiler = SelectorCompiler::with_config(Arc::clone(&registry), executor.clone(), config);

        Self {
            executor,
            registry,
            compiler,
        }
    }

    /// Inserts a page and returns its id.
    pub fn add(&self, page: PageSpec) -> PageId {
        let conn = self.executor.connection().expect("connection");
        conn.execute(
            "INSERT INTO pages (parent_id, templates_id, name, status, sort, created, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![page.parent, page.template, page.name, page.status, page.sort, page.created],
        )
        .expect("insert page");
        let id = conn.last_insert_rowid();

        // ancestor closure: the parent and every ancestor of the parent
        conn.execute(
            "INSERT INTO pages_parents (pages_id, parents_id) \
             SELECT ?1, parents_id FROM pages_parents WHERE pages_id = ?2 \
             UNION SELECT ?1, ?2",
            params![id, page.parent],
        )
        .expect("insert ancestors");

        // pages of templates without their own roles inherit the governing
        // template of the nearest ancestor that has one
        let registry = self.registry.read();
        let own_roles = registry
            .template_by_id(page.template)
            .map(|t| t.use_roles)
            .unwrap_or(false);
        if !own_roles {
            if let Some(governing) = governing_template(&conn, &registry, page.parent) {
                conn.execute(
                    "INSERT INTO pages_access (pages_id, templates_id) VALUES (?1, ?2)",
                    params![id, governing],
                )
                .expect("insert access");
            }
        }
        id
    }

    /// Adds `count` published pages named `{prefix}-{n}` of a template.
    pub fn add_many(&self, prefix: &str, template: TemplateId, count: usize) -> Vec<PageId> {
        (0..count)
            .map(|n| self.add(PageSpec::new(&format!("{}-{}", prefix, n), template).sort(n as i64)))
            .collect()
    }

    /// Stores a single-value field.
    pub fn set(&self, page: PageId, field: &str, value: impl rusqlite::ToSql) {
        let sql = format!("INSERT OR REPLACE INTO field_{} (pages_id, data) VALUES (?1, ?2)", field);
        self.executor
            .connection()
            .expect("connection")
            .execute(&sql, params![page, value])
            .expect("set field");
    }

    /// Appends references to a page reference field.
    pub fn add_refs(&self, page: PageId, field: &str, targets: &[PageId]) {
        let conn = self.executor.connection().expect("connection");
        let sql = format!("INSERT INTO field_{} (pages_id, data, sort) VALUES (?1, ?2, ?3)", field);
        for (sort, target) in targets.iter().enumerate() {
            conn.execute(&sql, params![page, target, sort as i64])
                .expect("add ref");
        }
    }

    /// Compiles as a guest with default options.
    pub fn find(&self, predicates: &[Predicate]) -> SelectorResult<CompileResult> {
        self.compiler
            .compile(&RequestContext::guest(), predicates, &CompileOptions::default())
    }

    /// Compiles as a guest and returns the ids.
    pub fn ids(&self, predicates: &[Predicate]) -> Vec<PageId> {
        self.find(predicates).expect("compile").ids
    }

    /// Compiles with the given context and options.
    pub fn find_with(
        &self,
        ctx: &RequestContext,
        predicates: &[Predicate],
        options: &CompileOptions,
    ) -> SelectorResult<CompileResult> {
        self.compiler.compile(ctx, predicates, options)
    }
}

fn governing_template(
    conn: &rusqlite::Connection,
    registry: &SchemaRegistry,
    page: PageId,
) -> Option<TemplateId> {
    let template: TemplateId = conn
        .query_row("SELECT templates_id FROM pages WHERE id = ?1", params![page], |r| r.get(0))
        .ok()?;
    if registry.template_by_id(template).is_some_and(|t| t.use_roles) {
        return Some(template);
    }
    conn.query_row(
        "SELECT templates_id FROM pages_access WHERE pages_id = ?1",
        params![page],
        |r| r.get(0),
    )
    .ok()
}

/// A context for an identity holding the member role.
pub fn member() -> RequestContext {
    RequestContext::new(AccessIdentity::with_roles([MEMBER_ROLE]))
}
