//! Composable, parameterized filters for news store lookups.
//!
//! # Responsibility
//! - Render typed predicates into SQL fragments with positional `?` binds.
//! - Keep the presence/role predicates of the initializer testable without
//!   a database.
//!
//! # Invariants
//! - Caller values are only ever bound, never interpolated into SQL.
//! - An empty role set in `AnyDefaultRole` matches nothing; in
//!   `NoDefaultRole` it matches everything. Neither equals "no filter".
//!
//! Fragments assume the aliases `c` (news_configurations), `d`
//! (news_definitions) and `s` (news_sets).

use crate::model::configuration::ConfigurationId;
use crate::model::definition::DefinitionId;
use crate::model::news_set::SetId;
use crate::model::{DefinitionKind, RoleSet};
use rusqlite::types::Value;

/// A single named, typed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    ConfigurationId(ConfigurationId),
    ConfigurationInSet(SetId),
    ConfigurationKind(DefinitionKind),
    ConfigurationDefinition(DefinitionId),
    SubscribeId(String),
    Displayed,
    VisibleOnly,
    DefinitionId(DefinitionId),
    DefinitionKind(DefinitionKind),
    DefinitionName(String),
    /// No configuration in the set references the definition.
    DefinitionNotInSet(SetId),
    /// At least one default role of the definition is in the role set.
    AnyDefaultRole(RoleSet),
    /// No default role of the definition is in the role set.
    NoDefaultRole(RoleSet),
    SetId(SetId),
    SetOwner(String),
    SetName(String),
}

impl Predicate {
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::ConfigurationId(id) => bind("c.id = ?", params, uuid_value(id)),
            Self::ConfigurationInSet(id) => bind("c.set_id = ?", params, uuid_value(id)),
            Self::ConfigurationKind(kind) => bind("c.kind = ?", params, kind_value(*kind)),
            Self::ConfigurationDefinition(id) => {
                bind("c.definition_id = ?", params, uuid_value(id))
            }
            Self::SubscribeId(value) => bind("c.subscribe_id = ?", params, text(value)),
            Self::Displayed => "c.displayed = 1".to_string(),
            Self::VisibleOnly => "c.visible_only = 1".to_string(),
            Self::DefinitionId(id) => bind("d.id = ?", params, uuid_value(id)),
            Self::DefinitionKind(kind) => bind("d.kind = ?", params, kind_value(*kind)),
            Self::DefinitionName(name) => bind("d.name = ?", params, text(name)),
            Self::DefinitionNotInSet(id) => bind(
                "NOT EXISTS (
                    SELECT 1 FROM news_configurations present
                    WHERE present.definition_id = d.id AND present.set_id = ?
                )",
                params,
                uuid_value(id),
            ),
            Self::AnyDefaultRole(roles) => {
                if roles.is_empty() {
                    return "0 = 1".to_string();
                }
                format!("EXISTS ({})", role_membership(roles, params))
            }
            Self::NoDefaultRole(roles) => {
                if roles.is_empty() {
                    return "1 = 1".to_string();
                }
                format!("NOT EXISTS ({})", role_membership(roles, params))
            }
            Self::SetId(id) => bind("s.id = ?", params, uuid_value(id)),
            Self::SetOwner(user_id) => bind("s.user_id = ?", params, text(user_id)),
            Self::SetName(name) => bind("s.name = ?", params, text(name)),
        }
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds a `SELECT` from a fixed projection and a list of predicates.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    projection: &'static str,
    predicates: Vec<Predicate>,
    order_by: Option<&'static str>,
}

impl SelectQuery {
    /// Starts a query from a projection such as `SELECT ... FROM x AS c`.
    pub fn select(projection: &'static str) -> Self {
        Self {
            projection,
            predicates: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds `predicate` only when `condition` holds.
    pub fn filter_if(self, condition: bool, predicate: Predicate) -> Self {
        if condition {
            self.filter(predicate)
        } else {
            self
        }
    }

    pub fn order_by(mut self, clause: &'static str) -> Self {
        self.order_by = Some(clause);
        self
    }

    pub fn build(&self) -> BoundQuery {
        let mut sql = String::from(self.projection);
        let mut params = Vec::new();

        for (index, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&predicate.render(&mut params));
        }

        if let Some(order_by) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }

        BoundQuery { sql, params }
    }
}

fn role_membership(roles: &RoleSet, params: &mut Vec<Value>) -> String {
    let placeholders = vec!["?"; roles.len()].join(", ");
    params.extend(roles.iter().map(|role| Value::Text(role.clone())));
    format!(
        "SELECT 1 FROM definition_roles granted
         WHERE granted.definition_id = d.id AND granted.role IN ({placeholders})"
    )
}

fn bind(fragment: &str, params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    fragment.to_string()
}

fn uuid_value(id: &uuid::Uuid) -> Value {
    Value::Text(id.to_string())
}

fn kind_value(kind: DefinitionKind) -> Value {
    Value::Text(kind.as_db().to_string())
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
