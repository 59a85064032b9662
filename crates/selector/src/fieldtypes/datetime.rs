//! Date/time fields.
//!
//! Comparisons respect the precision of the input, so `2024-01` equals every
//! value in January 2024 and `>2024-01` starts in February.

use crate::error::SelectorResult;
use crate::query::{QueryFragment, SqlFragment, SqlParam};
use crate::types::{Operator, Scalar, Timestamp, parse_timestamp};

use super::{ColumnDef, Fieldtype, MatchContext};

const COLUMNS: &[ColumnDef] = &[ColumnDef {
    name: "data",
    sql_type: "TEXT",
}];

/// A datetime field. Blank value is NULL.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatetimeField;

/// Builds the range condition for a date column.
///
/// Returns `None` for operators with no date meaning.
pub fn timestamp_condition(column: &str, operator: Operator, ts: &Timestamp) -> Option<SqlFragment> {
    let (start, end) = ts.range()?;
    let fragment = match operator {
        Operator::Equal => SqlFragment::with_params(
            format!("{column} >= ? AND {column} < ?"),
            vec![SqlParam::string(start), SqlParam::string(end)],
        ),
        Operator::NotEqual => SqlFragment::with_params(
            format!("({column} < ? OR {column} >= ?)"),
            vec![SqlParam::string(start), SqlParam::string(end)],
        ),
        Operator::GreaterThan => {
            SqlFragment::with_params(format!("{column} >= ?"), vec![SqlParam::string(end)])
        }
        Operator::GreaterThanEqual => {
            SqlFragment::with_params(format!("{column} >= ?"), vec![SqlParam::string(start)])
        }
        Operator::LessThan => {
            SqlFragment::with_params(format!("{column} < ?"), vec![SqlParam::string(start)])
        }
        Operator::LessThanEqual => {
            SqlFragment::with_params(format!("{column} < ?"), vec![SqlParam::string(end)])
        }
        _ => return None,
    };
    Some(fragment)
}

impl Fieldtype for DatetimeField {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn supports(&self, operator: Operator) -> bool {
        operator.sql_comparison().is_some()
    }

    fn match_clause(&self, ctx: &MatchContext<'_>, value: &Scalar) -> SelectorResult<QueryFragment> {
        let column = ctx.column_ref();

        if value.is_null() {
            let condition = match ctx.operator {
                Operator::Equal => SqlFragment::new(format!("{} IS NULL", column)),
                _ => SqlFragment::always_false(),
            };
            return Ok(QueryFragment::condition(condition));
        }

        let ts = parse_timestamp(value, ctx.now)
            .ok_or_else(|| ctx.invalid_value(value, "expected a date"))?;
        let condition = timestamp_condition(&column, ctx.operator, &ts)
            .ok_or_else(|| ctx.unsupported(self.name()))?;

        Ok(QueryFragment::condition(condition))
    }

    fn blank_value(&self) -> Scalar {
        Scalar::Null
    }
}
