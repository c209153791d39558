mod placeholder;
mod row;
mod sql_value;

pub use placeholder::{in_list, Param, Placeholders};
pub use row::{RawQueryResult, Row};
pub use sql_value::{ParamType, SqlValue};
