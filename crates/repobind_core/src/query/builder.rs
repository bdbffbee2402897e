//! Query builder bound to one entity descriptor and alias.
//!
//! # Invariants
//! - The alias is a non-empty identifier; it is only used to qualify columns.
//! - Every identifier is rendered double-quoted, so keywords such as `order` work.
//! - Only columns mapped by the descriptor are rendered into SQL.
//! - Column errors are reported when the query is rendered.

use crate::manager::{ManagerError, ManagerResult};
use crate::model::entity::EntityDescriptor;
use crate::model::ident::{is_identifier, quoted};
use rusqlite::types::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq(String, Value),
    IsNull(String),
}

/// SELECT builder for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    entity: EntityDescriptor,
    alias: String,
    filters: Vec<Filter>,
    order: Vec<(String, Order)>,
    limit: Option<u32>,
    offset: u32,
}

impl QueryBuilder {
    /// Creates a builder; fails when `alias` is not an identifier.
    pub fn new(entity: EntityDescriptor, alias: &str) -> ManagerResult<Self> {
        let alias = alias.trim();
        if !is_identifier(alias) {
            return Err(ManagerError::InvalidAlias(alias.to_string()));
        }
        Ok(Self {
            entity,
            alias: alias.to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
        })
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Renders SQL with positional `?` placeholders and their bind values.
    pub fn to_sql(&self) -> ManagerResult<(String, Vec<Value>)> {
        self.check_columns()?;

        let alias = quoted(&self.alias);
        let column_ref = |column: &str| format!("{alias}.{}", quoted(column));
        let projection = self
            .entity
            .all_columns()
            .map(|column| format!("{} AS {}", column_ref(column), quoted(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {projection} FROM {} {alias}",
            quoted(&self.entity.table)
        );
        let mut bind_values = Vec::new();

        if !self.filters.is_empty() {
            let conditions = self
                .filters
                .iter()
                .map(|filter| match filter {
                    Filter::Eq(column, value) => {
                        bind_values.push(value.clone());
                        format!("{} = ?", column_ref(column))
                    }
                    Filter::IsNull(column) => format!("{} IS NULL", column_ref(column)),
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, order)| format!("{} {}", column_ref(column), order.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(self.offset)));
        }

        Ok((sql, bind_values))
    }

    fn check_columns(&self) -> ManagerResult<()> {
        let filter_columns = self.filters.iter().map(|filter| match filter {
            Filter::Eq(column, _) | Filter::IsNull(column) => column.as_str(),
        });
        let order_columns = self.order.iter().map(|(column, _)| column.as_str());

        for column in filter_columns.chain(order_columns) {
            if !self.entity.has_column(column) {
                return Err(ManagerError::UnknownColumn {
                    entity: self.entity.name.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}
