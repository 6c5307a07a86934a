//! Allow-list filter over schema/table names.

use regex::Regex;

use crate::error::{Result, SchemaGraphError};

/// Wildcard allow-list for `schema.table` names.
///
/// Patterns use `*` as the only wildcard (`dbo.*`, `*.customers`,
/// `sales.ord*`). An empty pattern list allows everything.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    patterns: Vec<Regex>,
}

impl TableFilter {
    /// Filter that allows every table.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                return Err(SchemaGraphError::InvalidInput(
                    "empty allow-list pattern".to_string(),
                ));
            }
            let regex = format!("(?i)^{}$", regex::escape(pattern).replace(r"\*", ".*"));
            let regex = Regex::new(&regex).map_err(|e| {
                SchemaGraphError::InvalidInput(format!("bad allow-list pattern {pattern}: {e}"))
            })?;
            compiled.push(regex);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn allows(&self, schema_name: &str, table_name: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let qualified = format!("{schema_name}.{table_name}");
        self.patterns.iter().any(|p| p.is_match(&qualified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_by_default() {
        let filter = TableFilter::allow_all();
        assert!(filter.allows("dbo", "customers"));
        assert!(filter.allows("staging", "anything"));
    }

    #[test]
    fn test_schema_wildcard() {
        let filter = TableFilter::from_patterns(&["dbo.*"]).unwrap();
        assert!(filter.allows("dbo", "customers"));
        assert!(!filter.allows("staging", "customers"));
    }

    #[test]
    fn test_table_prefix_wildcard() {
        let filter = TableFilter::from_patterns(&["sales.ord*"]).unwrap();
        assert!(filter.allows("sales", "orders"));
        assert!(filter.allows("sales", "order_lines"));
        assert!(!filter.allows("sales", "customers"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let filter = TableFilter::from_patterns(&["dbo.Customers"]).unwrap();
        assert!(filter.allows("DBO", "customers"));
    }

    #[test]
    fn test_multiple_patterns_any_match() {
        let filter = TableFilter::from_patterns(&["dbo.*", "*.audit_log"]).unwrap();
        assert!(filter.allows("dbo", "orders"));
        assert!(filter.allows("staging", "audit_log"));
        assert!(!filter.allows("staging", "orders"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(TableFilter::from_patterns(&[""]).is_err());
    }
}
