use super::{DbError, Result, DataType, Value};
use std::cmp::Ordering;

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Table the column belongs to, empty for computed columns.
    pub source: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            source: String::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(DbError::ExecutionError(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Schema of an `old ‖ new` row pair.
    pub fn doubled(&self) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(self.columns.iter().cloned());
        Schema { columns }
    }

    /// Compares two rows column by column using each column's type.
    ///
    /// Rows of different widths are never equal. Two NULLs are equal.
    pub fn rows_equal(&self, left: &[Value], right: &[Value]) -> Result<bool> {
        if left.len() != right.len() {
            return Ok(false);
        }

        for (i, (a, b)) in left.iter().zip(right.iter()).enumerate() {
            let ordering = a.compare(b).map_err(|err| match self.columns.get(i) {
                Some(column) => DbError::TypeMismatch(format!("column '{}': {}", column.name, err)),
                None => err,
            })?;
            if ordering != Ordering::Equal {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn validate_row(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Row has {} values, schema expects {}",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }
}

pub fn estimated_row_bytes(row: &[Value]) -> usize {
    row.iter().map(Value::estimated_bytes).sum::<usize>() + std::mem::size_of::<Row>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int64).not_null(),
            Column::new("name", DataType::Text),
        ])
    }

    #[test]
    fn test_rows_equal() {
        let schema = schema();
        let a = vec![Value::Integer(1), Value::Text("a".into())];
        let b = vec![Value::Integer(1), Value::Text("b".into())];
        assert!(schema.rows_equal(&a, &a.clone()).unwrap());
        assert!(!schema.rows_equal(&a, &b).unwrap());
        assert!(!schema.rows_equal(&a, &a[..1]).unwrap());
    }

    #[test]
    fn test_rows_equal_nulls() {
        let schema = schema();
        let a = vec![Value::Integer(1), Value::Null];
        assert!(schema.rows_equal(&a, &a.clone()).unwrap());
        let b = vec![Value::Integer(1), Value::Text("x".into())];
        assert!(!schema.rows_equal(&a, &b).unwrap());
    }

    #[test]
    fn test_rows_equal_type_error() {
        let schema = schema();
        let a = vec![Value::Integer(1), Value::Text("a".into())];
        let b = vec![Value::Text("1".into()), Value::Text("a".into())];
        assert!(schema.rows_equal(&a, &b).is_err());
    }

    #[test]
    fn test_validate_row() {
        let schema = schema();
        assert!(schema.validate_row(&[Value::Integer(1), Value::Null]).is_ok());
        assert!(schema.validate_row(&[Value::Null, Value::Null]).is_err());
        assert!(schema.validate_row(&[Value::Integer(1)]).is_err());
    }
}
