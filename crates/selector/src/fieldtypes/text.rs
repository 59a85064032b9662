//! Single-line and multi-line text fields.

use crate::error::SelectorResult;
use crate::query::{QueryFragment, SqlFragment, SqlParam, escape_like};
use crate::types::{Operator, Scalar};

use super::{ColumnDef, Fieldtype, MatchContext};

const COLUMNS: &[ColumnDef] = &[ColumnDef {
    name: "data",
    sql_type: "TEXT",
}];

/// A text field. Blank value is the empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextField;

impl TextField {
    fn like(column: &str, pattern: String) -> SqlFragment {
        SqlFragment::with_params(
            format!("{} LIKE ? ESCAPE '\\'", column),
            vec![SqlParam::string(pattern)],
        )
    }
}

impl Fieldtype for TextField {
    fn name(&self) -> &'static str {
        "text"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn supports(&self, operator: Operator) -> bool {
        operator != Operator::BitAnd
    }

    fn match_clause(&self, ctx: &MatchContext<'_>, value: &Scalar) -> SelectorResult<QueryFragment> {
        let column = ctx.column_ref();
        let text = value.as_text();

        let fragment = match ctx.operator {
            Operator::ContainsPhrase => QueryFragment::condition(Self::like(
                &column,
                format!("%{}%", escape_like(&text)),
            )),
            Operator::StartsWith => {
                QueryFragment::condition(Self::like(&column, format!("{}%", escape_like(&text))))
            }
            Operator::EndsWith => {
                QueryFragment::condition(Self::like(&column, format!("%{}", escape_like(&text))))
            }
            Operator::Like => QueryFragment::condition(SqlFragment::with_params(
                format!("{} LIKE ?", column),
                vec![SqlParam::string(text.as_ref())],
            )),
            Operator::ContainsWords => {
                let mut fragment = QueryFragment::default();
                for word in text.split_whitespace() {
                    let pattern = format!("%{}%", escape_like(word));
                    fragment.wheres.push(Self::like(&column, pattern.clone()));
                    // one point per matched word
                    fragment.scores.push(Self::like(&column, pattern));
                }
                if fragment.wheres.is_empty() {
                    fragment.wheres.push(SqlFragment::always_true());
                }
                fragment
            }
            op => match op.sql_comparison() {
                Some(cmp) => QueryFragment::condition(SqlFragment::with_params(
                    format!("{} {} ?", column, cmp),
                    vec![SqlParam::string(text.as_ref())],
                )),
                None => return Err(ctx.unsupported(self.name())),
            },
        };

        Ok(fragment)
    }

    fn blank_value(&self) -> Scalar {
        Scalar::Text(String::new())
    }
}
