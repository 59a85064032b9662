//! Structured SQL construction.
//!
//! Resolvers never concatenate values into SQL. They build [`SqlFragment`]s
//! with bound [`SqlParam`]s, accrete them on a [`QueryBuilder`], and the
//! renderer turns the builder into a [`Statement`].

mod builder;
mod fragment;
mod render;

pub use builder::{
    Join, JoinKind, JoinSource, OrderBy, QueryBuilder, QueryFragment, SortDirection,
};
pub use fragment::{SqlFragment, SqlParam, escape_like};
pub use render::{Column, Statement, StatementKind, render, render_count, render_id_subquery};
