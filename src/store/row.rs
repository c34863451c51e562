use std::collections::HashMap;

use rusqlite::types::Value;

/// One result row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.values.get(column)? {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(x) => Some(*x),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.values.get(column)? {
            Value::Integer(n) => Some(*n),
            Value::Real(x) if x.fract() == 0.0 => Some(*x as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.values.get(column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a statement produced, by statement kind.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Inserted(i64),
    Affected(usize),
}

impl QueryOutput {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Row(row) => row.into_iter().collect(),
            QueryOutput::Inserted(_) | QueryOutput::Affected(_) => Vec::new(),
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            QueryOutput::Rows(rows) => rows.into_iter().next(),
            QueryOutput::Row(row) => row,
            QueryOutput::Inserted(_) | QueryOutput::Affected(_) => None,
        }
    }

    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            QueryOutput::Inserted(id) => Some(*id),
            _ => None,
        }
    }

    pub fn affected(&self) -> usize {
        match self {
            QueryOutput::Affected(n) => *n,
            QueryOutput::Inserted(_) => 1,
            QueryOutput::Rows(_) | QueryOutput::Row(_) => 0,
        }
    }
}

/// How many rows a read statement should return. Writes ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    All,
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Insert,
    Modify,
}

impl StatementKind {
    pub fn of(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|ch: char| ch.is_whitespace() || ch == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" | "VALUES" => StatementKind::Read,
            "INSERT" | "REPLACE" => StatementKind::Insert,
            _ => StatementKind::Modify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_kind_uses_leading_keyword() {
        assert_eq!(StatementKind::of("  select 1"), StatementKind::Read);
        assert_eq!(
            StatementKind::of("\n WITH t AS (SELECT 1) SELECT * FROM t"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::of("INSERT INTO t VALUES (1)"),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::of("update t set a = 1"), StatementKind::Modify);
        assert_eq!(StatementKind::of("DELETE FROM t"), StatementKind::Modify);
    }

    #[test]
    fn row_getters_coerce_numeric_columns() {
        let row = Row::from_pairs([
            ("n".to_string(), Value::Integer(30)),
            ("avg".to_string(), Value::Real(2.75)),
            ("name".to_string(), Value::Text("Lyon".to_string())),
            ("missing".to_string(), Value::Null),
        ]);
        assert_eq!(row.get_f64("n"), Some(30.0));
        assert_eq!(row.get_i64("n"), Some(30));
        assert_eq!(row.get_f64("avg"), Some(2.75));
        assert_eq!(row.get_i64("avg"), None);
        assert_eq!(row.get_text("name"), Some("Lyon"));
        assert_eq!(row.get_f64("missing"), None);
        assert_eq!(row.get_f64("absent"), None);
    }
}
