//! Integer fields.

use crate::error::SelectorResult;
use crate::query::{QueryFragment, SqlFragment, SqlParam};
use crate::types::{Operator, Scalar};

use super::{ColumnDef, Fieldtype, MatchContext};

const COLUMNS: &[ColumnDef] = &[ColumnDef {
    name: "data",
    sql_type: "INTEGER",
}];

/// An integer field. Blank value is `0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerField;

impl Fieldtype for IntegerField {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn supports(&self, operator: Operator) -> bool {
        operator.sql_comparison().is_some() || operator == Operator::BitAnd
    }

    fn match_clause(&self, ctx: &MatchContext<'_>, value: &Scalar) -> SelectorResult<QueryFragment> {
        let number = value
            .as_i64()
            .ok_or_else(|| ctx.invalid_value(value, "expected an integer"))?;
        let column = ctx.column_ref();

        let condition = match ctx.operator {
            Operator::BitAnd => SqlFragment::with_params(
                format!("({} & ?) != 0", column),
                vec![SqlParam::integer(number)],
            ),
            op => match op.sql_comparison() {
                Some(cmp) => SqlFragment::with_params(
                    format!("{} {} ?", column, cmp),
                    vec![SqlParam::integer(number)],
                ),
                None => return Err(ctx.unsupported(self.name())),
            },
        };

        Ok(QueryFragment::condition(condition))
    }

    fn blank_value(&self) -> Scalar {
        Scalar::Integer(0)
    }
}
