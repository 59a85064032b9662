//! Selector compiler integration tests over the SQLite executor.

#![cfg(feature = "sqlite")]

mod common;

use std::collections::HashMap;

use folio_selector::core::RequestContext;
use folio_selector::error::{SelectorError, SyntaxError};
use folio_selector::types::{CompileOptions, Operator, PageId, Predicate, Scalar, Status};
use folio_selector::CompilerConfig;

use common::*;

/// The fixture page tree:
///
/// ```text
/// home
/// ├── about
/// │   └── team
/// ├── news
/// │   ├── first        title "Rust in production", views 10, tags [rust]
/// │   ├── second       title "",                  views 5,  tags [rust, sql]
/// │   ├── third        title "Query compilers",   no views
/// │   └── notes        hidden
/// └── tags
///     ├── rust
///     └── sql
/// ```
struct Tree {
    site: Site,
    about: PageId,
    team: PageId,
    news: PageId,
    first: PageId,
    second: PageId,
    third: PageId,
    notes: PageId,
    tags: PageId,
    rust: PageId,
    sql: PageId,
}

fn tree() -> Tree {
    let site = Site::new();
    let about = site.add(PageSpec::new("about", BASIC).sort(0));
    let team = site.add(PageSpec::new("team", BASIC).parent(about));
    let news = site.add(PageSpec::new("news", BASIC).sort(1));
    let tags = site.add(PageSpec::new("tags", BASIC).sort(2));
    let rust = site.add(PageSpec::new("rust", TAG).parent(tags));
    let sql = site.add(PageSpec::new("sql", TAG).parent(tags).sort(1));

    let first = site.add(
        PageSpec::new("first", ARTICLE)
            .parent(news)
            .sort(0)
            .created("2024-03-15 10:00:00"),
    );
    let second = site.add(
        PageSpec::new("second", ARTICLE)
            .parent(news)
            .sort(1)
            .created("2024-07-01 00:00:00"),
    );
    let third = site.add(PageSpec::new("third", ARTICLE).parent(news).sort(2));
    let notes = site.add(
        PageSpec::new("notes", ARTICLE)
            .parent(news)
            .sort(3)
            .status(Status::ON | Status::HIDDEN),
    );

    site.set(first, "title", "Rust in production");
    site.set(second, "title", "");
    site.set(third, "title", "Query compilers");
    site.set(first, "views", 10);
    site.set(second, "views", 5);
    site.add_refs(first, "tags", &[rust]);
    site.add_refs(second, "tags", &[rust, sql]);

    Tree {
        site,
        about,
        team,
        news,
        first,
        second,
        third,
        notes,
        tags,
        rust,
        sql,
    }
}

fn articles(extra: Predicate) -> Vec<Predicate> {
    vec![Predicate::eq("template", "article"), extra]
}

// ============================================================================
// Native columns and status
// ============================================================================

#[test]
fn test_template_excludes_hidden_pages() {
    let t = tree();
    let ids = t.site.ids(&[Predicate::eq("template", "article")]);
    assert_eq!(ids, vec![t.first, t.second, t.third]);
}

#[test]
fn test_include_hidden() {
    let t = tree();
    let ids = t.site.ids(&articles(Predicate::eq("include", "hidden")));
    assert_eq!(ids, vec![t.first, t.second, t.third, t.notes]);
}

#[test]
fn test_status_name_matches_bit() {
    let t = tree();
    // naming status raises the ceiling to include hidden pages
    let ids = t.site.ids(&[Predicate::eq("status", "hidden")]);
    assert_eq!(ids, vec![t.notes]);
}

#[test]
fn test_template_by_id_and_unknown_name() {
    let t = tree();
    assert_eq!(t.site.ids(&[Predicate::eq("template", TAG)]), vec![t.rust, t.sql]);

    let err = t.site.find(&[Predicate::eq("template", "nope")]).unwrap_err();
    assert!(matches!(
        err,
        SelectorError::Syntax(SyntaxError::UnknownTemplate { .. })
    ));
}

#[test]
fn test_parent_and_parent_subfield() {
    let t = tree();
    assert_eq!(
        t.site.ids(&[Predicate::eq("parent", t.news)]),
        vec![t.first, t.second, t.third]
    );
    assert_eq!(
        t.site.ids(&[Predicate::eq("parent.name", "about")]),
        vec![t.team]
    );
    assert_eq!(
        t.site.ids(&[Predicate::eq("parent", "/tags/")]),
        vec![t.rust, t.sql]
    );
}

#[test]
fn test_created_respects_precision() {
    let t = tree();
    assert_eq!(
        t.site.ids(&articles(Predicate::new("created", Operator::GreaterThanEqual, "2024-06"))),
        vec![t.second]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("created", "2024-03"))),
        vec![t.first]
    );
}

#[test]
fn test_date_at_the_last_representable_second_is_rejected() {
    let t = tree();
    let last = chrono::NaiveDateTime::MAX.and_utc().timestamp();
    for predicate in [
        Predicate::new("created", Operator::LessThanEqual, last),
        Predicate::eq("published_on", last),
    ] {
        let err = t.site.find(&[predicate]).unwrap_err();
        assert!(matches!(
            err,
            SelectorError::Syntax(SyntaxError::InvalidValue { .. })
        ));
    }

    // one second earlier still has a representable end
    assert!(
        t.site
            .find(&[Predicate::new("created", Operator::LessThan, last - 1)])
            .is_ok()
    );
}

// ============================================================================
// Virtual attributes
// ============================================================================

#[test]
fn test_path() {
    let t = tree();
    assert_eq!(t.site.ids(&[Predicate::eq("path", "/about/team/")]), vec![t.team]);
    assert_eq!(t.site.ids(&[Predicate::eq("path", "/news/first/")]), vec![t.first]);
    assert_eq!(t.site.ids(&[Predicate::eq("path", "/")]), vec![ROOT]);
    assert!(t.site.ids(&[Predicate::eq("path", "/team/")]).is_empty());
}

#[test]
fn test_path_alternatives_and_exclusion() {
    let t = tree();
    let either = Predicate::any_of("path", Operator::Equal, ["/about/", "/news/"]);
    assert_eq!(t.site.ids(&[either]), vec![t.about, t.news]);

    let ids = t.site.ids(&[
        Predicate::eq("template", "basic"),
        Predicate::new("path", Operator::NotEqual, "/about/team/"),
    ]);
    assert_eq!(ids, vec![t.about, t.news, t.tags]);
}

#[test]
fn test_has_parent() {
    let t = tree();
    assert_eq!(
        t.site.ids(&[Predicate::eq("has_parent", t.news)]),
        vec![t.first, t.second, t.third]
    );
    assert_eq!(
        t.site.ids(&[Predicate::eq("has_parent", "/about/")]),
        vec![t.team]
    );

    // pages without ancestors rows (the home page) still pass the exclusion
    let ids = t.site.ids(&[
        Predicate::any_of("template", Operator::Equal, ["home", "basic"]),
        Predicate::new("has_parent", Operator::NotEqual, t.about),
    ]);
    assert_eq!(ids, vec![ROOT, t.about, t.news, t.tags]);
}

#[test]
fn test_num_children() {
    let t = tree();
    let basic = |p: Predicate| vec![Predicate::eq("template", "basic"), p];

    assert_eq!(t.site.ids(&basic(Predicate::eq("num_children", 0))), vec![t.team]);
    assert_eq!(
        t.site.ids(&basic(Predicate::new("num_children", Operator::GreaterThanEqual, 1))),
        vec![t.about, t.news, t.tags]
    );
    assert_eq!(
        t.site.ids(&basic(Predicate::new("num_children", Operator::GreaterThan, 2))),
        vec![t.news]
    );
}

#[test]
fn test_num_children_total_with_having() {
    let t = tree();
    let result = t
        .site
        .find_with(
            &RequestContext::guest(),
            &[
                Predicate::eq("template", "basic"),
                Predicate::new("num_children", Operator::LessThan, 3),
                Predicate::eq("limit", 1),
            ],
            &CompileOptions::default(),
        )
        .unwrap();
    assert_eq!(result.ids, vec![t.about]);
    assert_eq!(result.total, Some(3));
}

// ============================================================================
// Custom fields
// ============================================================================

#[test]
fn test_blank_text() {
    let t = tree();
    assert_eq!(t.site.ids(&articles(Predicate::eq("title", ""))), vec![t.second]);
    assert_eq!(
        t.site.ids(&articles(Predicate::new("title", Operator::NotEqual, ""))),
        vec![t.first, t.third]
    );
}

#[test]
fn test_blank_text_accepts_absent_rows() {
    let t = tree();
    // tag pages store no title at all
    assert_eq!(
        t.site.ids(&[Predicate::eq("template", "tag"), Predicate::eq("title", "")]),
        vec![t.rust, t.sql]
    );
    assert_eq!(
        t.site.ids(&[
            Predicate::eq("template", "tag"),
            Predicate::new("title", Operator::NotEqual, "")
        ]),
        vec![t.rust, t.sql]
    );
}

#[test]
fn test_text_ranges_treat_absent_rows_as_empty() {
    let t = tree();
    let tags = |p: Predicate| t.site.ids(&[Predicate::eq("template", "tag"), p]);
    assert_eq!(tags(Predicate::new("title", Operator::LessThan, "b")), vec![t.rust, t.sql]);
    assert_eq!(tags(Predicate::new("title", Operator::LessThanEqual, "")), vec![t.rust, t.sql]);
    assert!(tags(Predicate::new("title", Operator::GreaterThan, "a")).is_empty());

    // stored values still compare byte-wise: "Query..." and "Rust..." sort before "b"
    assert_eq!(
        t.site.ids(&articles(Predicate::new("title", Operator::LessThan, "b"))),
        vec![t.first, t.second, t.third]
    );
}

#[test]
fn test_negation_includes_pages_without_row() {
    let t = tree();
    assert_eq!(
        t.site.ids(&articles(Predicate::new("views", Operator::NotEqual, 5))),
        vec![t.first, t.third]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("views", 5).negated())),
        vec![t.first, t.third]
    );
    // the two negations cancel out
    assert_eq!(
        t.site.ids(&articles(Predicate::new("views", Operator::NotEqual, 5).negated())),
        vec![t.second]
    );
}

#[test]
fn test_blank_integer_and_ranges() {
    let t = tree();
    assert_eq!(t.site.ids(&articles(Predicate::eq("views", 0))), vec![t.third]);
    assert_eq!(
        t.site.ids(&articles(Predicate::new("views", Operator::LessThan, 6))),
        vec![t.second, t.third]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::new("views", Operator::GreaterThan, 6))),
        vec![t.first]
    );
}

#[test]
fn test_text_operators() {
    let t = tree();
    assert_eq!(
        t.site.ids(&articles(Predicate::new("title", Operator::ContainsPhrase, "in prod"))),
        vec![t.first]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::new("title", Operator::StartsWith, "Query"))),
        vec![t.third]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::new("title", Operator::ContainsWords, "production rust"))),
        vec![t.first]
    );
}

#[test]
fn test_multi_field_predicate() {
    let t = tree();
    t.site.set(t.about, "title", "About production");
    let ids = t.site.ids(&[Predicate::any_field(
        ["title", "name"],
        Operator::ContainsPhrase,
        "production",
    )]);
    assert_eq!(ids, vec![t.about, t.first]);
}

#[test]
fn test_verbose_rows_carry_score() {
    let t = tree();
    let result = t
        .site
        .find_with(
            &RequestContext::guest(),
            &articles(Predicate::new("title", Operator::ContainsWords, "rust")),
            &CompileOptions::default().verbose(),
        )
        .unwrap();
    let rows = result.verbose_rows.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, t.first);
    assert_eq!(rows[0].parent_id, t.news);
    assert_eq!(rows[0].templates_id, ARTICLE);
    assert!(rows[0].score > 0.0);
}

// ============================================================================
// Sub-selectors and OR-groups
// ============================================================================

#[test]
fn test_sub_selector() {
    let t = tree();
    let by_tag = |name: &str| {
        t.site
            .ids(&[Predicate::sub_selector("tags", vec![Predicate::eq("name", name)])])
    };
    assert_eq!(by_tag("rust"), vec![t.first, t.second]);
    assert_eq!(by_tag("sql"), vec![t.second]);
    // no referenced page: an empty result, not an error
    assert!(by_tag("nothing").is_empty());
}

#[test]
fn test_sub_selector_matches_direct_ids() {
    let t = tree();
    let nested = vec![Predicate::eq("name", "sql")];
    let direct = t.site.ids(&[Predicate::eq("template", "tag"), nested[0].clone()]);
    assert_eq!(direct, vec![t.sql]);

    let via_sub = t.site.ids(&[Predicate::sub_selector("tags", nested)]);
    let via_ids = t.site.ids(&[Predicate::any_of("tags", Operator::Equal, direct)]);
    assert_eq!(via_sub, via_ids);
}

#[test]
fn test_relation_subfield_and_path_value() {
    let t = tree();
    assert_eq!(t.site.ids(&[Predicate::eq("tags.name", "sql")]), vec![t.second]);
    assert_eq!(t.site.ids(&[Predicate::eq("tags", "/tags/rust/")]), vec![t.first, t.second]);
}

#[test]
fn test_multi_value_exclusion() {
    let t = tree();
    // second references sql next to rust; one matching row disqualifies it
    assert_eq!(
        t.site.ids(&articles(Predicate::new("tags", Operator::NotEqual, t.sql))),
        vec![t.first, t.third]
    );
}

#[test]
fn test_or_group() {
    let t = tree();
    let ids = t.site.ids(&[
        Predicate::eq("template", "article"),
        Predicate::or_group("g", vec![Predicate::new("title", Operator::ContainsPhrase, "Rust")]),
        Predicate::or_group("g", vec![Predicate::eq("name", "third")]),
    ]);
    assert_eq!(ids, vec![t.first, t.third]);
}

#[test]
fn test_or_groups_with_different_labels_are_anded() {
    let t = tree();
    let ids = t.site.ids(&[
        Predicate::or_group("a", vec![Predicate::eq("views", 10)]),
        Predicate::or_group("a", vec![Predicate::eq("views", 5)]),
        Predicate::or_group("b", vec![Predicate::eq("tags", t.sql)]),
    ]);
    assert_eq!(ids, vec![t.second]);
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_sort_by_custom_field() {
    let t = tree();
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("sort", "-views"))),
        vec![t.first, t.second, t.third]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("sort", "views"))),
        vec![t.third, t.second, t.first]
    );
}

#[test]
fn test_sort_native_and_negated() {
    let t = tree();
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("sort", "-sort"))),
        vec![t.third, t.second, t.first]
    );
    assert_eq!(
        t.site.ids(&articles(Predicate::eq("sort", "sort").negated())),
        vec![t.third, t.second, t.first]
    );
    assert_eq!(
        t.site.ids(&[Predicate::eq("template", "basic"), Predicate::eq("sort", "-num_children")]),
        vec![t.news, t.tags, t.about, t.team]
    );
}

#[test]
fn test_find_one_honours_sort() {
    let t = tree();
    let result = t
        .site
        .find_with(
            &RequestContext::guest(),
            &articles(Predicate::eq("sort", "-created")),
            &CompileOptions::find_one(),
        )
        .unwrap();
    assert_eq!(result.ids, vec![t.second]);
    assert_eq!(result.limit, Some(1));
}

// ============================================================================
// Unknown names and bindings
// ============================================================================

#[test]
fn test_unknown_field_is_fatal() {
    let t = tree();
    let err = t.site.find(&[Predicate::eq("nonexistent", 1)]).unwrap_err();
    assert!(err.is_syntax());
    assert!(err.to_string().contains("nonexistent"));
}

#[test]
fn test_unsupported_operator_is_fatal() {
    let t = tree();
    let err = t
        .site
        .find(&[Predicate::new("title", Operator::BitAnd, 1)])
        .unwrap_err();
    assert!(matches!(
        err,
        SelectorError::Syntax(SyntaxError::UnsupportedOperator { .. })
    ));
}

#[test]
fn test_nesting_too_deep() {
    let site = Site::with_config(CompilerConfig::default().with_max_nesting_depth(1));
    let inner = Predicate::sub_selector("tags", vec![Predicate::eq("name", "x")]);
    let err = site
        .find(&[Predicate::sub_selector("tags", vec![inner])])
        .unwrap_err();
    assert!(matches!(
        err,
        SelectorError::Syntax(SyntaxError::NestingTooDeep { depth: 2, max: 1 })
    ));
}

#[test]
fn test_api_binding_resolves_to_constant() {
    let t = tree();
    let bindings: HashMap<String, Scalar> =
        HashMap::from([("lang".to_string(), Scalar::from("en"))]);
    let ctx = RequestContext::guest().with_bindings(bindings);
    let options = CompileOptions::default();

    let matching = t
        .site
        .find_with(&ctx, &articles(Predicate::eq("lang", "en")), &options)
        .unwrap();
    assert_eq!(matching.ids, vec![t.first, t.second, t.third]);

    let other = t
        .site
        .find_with(&ctx, &articles(Predicate::eq("lang", "fr")), &options)
        .unwrap();
    assert!(other.is_empty());

    let err = t
        .site
        .find_with(&ctx, &[Predicate::new("lang", Operator::GreaterThan, "a")], &options)
        .unwrap_err();
    assert!(err.is_syntax());
}

#[test]
fn test_compile_is_idempotent() {
    let t = tree();
    let selector = vec![
        Predicate::eq("has_parent", t.news),
        Predicate::new("views", Operator::NotEqual, 5),
        Predicate::sub_selector("tags", vec![Predicate::eq("name", "rust")]),
        Predicate::eq("sort", "-created"),
    ];
    let ctx = RequestContext::guest();
    let options = CompileOptions::default();

    let first = t.site.compiler.build_statement(&ctx, &selector, &options).unwrap();
    let second = t.site.compiler.build_statement(&ctx, &selector, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.sql.matches('?').count(), first.params.len());

    let a = t.site.find(&selector).unwrap();
    let b = t.site.find(&selector).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.ids, vec![t.first]);
}
