//! Inline view synthesis
//!
//! Wraps a command as `SELECT ... FROM (command) AS <name>_1` so that later stages see
//! the command's output as ordinary, uniquely named columns of a temporary group.

use std::collections::HashSet;

use crate::builder::convert_in;
use crate::commands::{Command, From, FromClause, Query, Select, SubqueryFromClause};
use crate::error::{Error, Result};
use crate::expressions::{ElementSymbol, Expression, SelectSymbol};
use crate::metadata::{Metadata, TempMetadataStore};

/// Wrap `nested` in an inline view named after `group`.
///
/// The outer SELECT projects every column of the view, matched by position to
/// `actual_symbols`: a column whose type differs is converted to the actual type, and a
/// column whose name differs is aliased to the actual name. The view's columns are
/// registered in the returned query's temporary metadata.
pub fn create_inline_view_query(
    group: &str,
    mut nested: Command,
    metadata: &dyn Metadata,
    actual_symbols: &[SelectSymbol],
) -> Result<Query> {
    let inline_name = format!("{}_1", group.replace('.', "_"));
    if let Some(query) = nested.projected_query_mut() {
        make_select_unique(&mut query.select, false);
    }

    let elements: Vec<ElementSymbol> = nested
        .projected_symbols()
        .iter()
        .map(|symbol| {
            let element = ElementSymbol::new(Some(&inline_name), symbol.name(), symbol.data_type());
            if symbol.expression.is_nullable() {
                element
            } else {
                element.not_null()
            }
        })
        .collect();
    if elements.len() != actual_symbols.len() {
        return Err(Error::component(format!(
            "inline view {inline_name} projects {} columns, expected {}",
            elements.len(),
            actual_symbols.len()
        )));
    }

    let mut store = TempMetadataStore::new();
    store.add_temp_group(&inline_name, elements.clone());

    let library = metadata.function_library();
    let symbols = elements
        .into_iter()
        .zip(actual_symbols)
        .map(|(element, actual)| {
            let name = element.name.clone();
            let target = actual.data_type();
            let mut symbol = if element.data_type == target {
                SelectSymbol::new(element.into())
            } else {
                let expr: Expression = element.into();
                SelectSymbol::aliased(convert_in(library, expr, target)?, name)
            };
            if symbol.short_canonical_name() != actual.short_canonical_name() {
                symbol.alias = Some(actual.name().to_string());
            }
            Ok(symbol)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Query {
        select: Select::new(symbols),
        from: Some(From {
            clauses: vec![FromClause::Subquery(Box::new(SubqueryFromClause {
                name: inline_name,
                command: nested,
                planned: false,
            }))],
        }),
        temp_metadata: store,
        ..Query::default()
    })
}

/// Give every projected column a name unique within the SELECT (case-insensitive).
///
/// A clashing name `n` becomes `n_0`, `n_1`, ... Renamed columns and unaliased
/// expressions get an explicit alias. With `expression_symbols_only`, only unaliased
/// expressions are touched, although every column's name still counts as taken.
pub fn make_select_unique(select: &mut Select, expression_symbols_only: bool) {
    let mut taken: HashSet<String> = HashSet::new();

    for symbol in &mut select.symbols {
        let base = symbol.name().to_string();
        let mut name = base.clone();
        let mut suffix = 0;
        while !taken.insert(name.to_uppercase()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }

        let is_expression = symbol.is_expression_symbol();
        if expression_symbols_only && !is_expression {
            continue;
        }
        if is_expression || name != base {
            symbol.alias = Some(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::metadata::MappingMetadata;
    use crate::types::DataType;

    fn a() -> Expression {
        col("t", "a", DataType::Integer)
    }

    #[test]
    fn test_make_select_unique_suffixes_duplicates() {
        let mut select = Select::new(vec![
            SelectSymbol::new(a()),
            SelectSymbol::new(col("u", "A", DataType::Integer)),
            SelectSymbol::new(int(1)),
            SelectSymbol::new(int(2)),
        ]);
        make_select_unique(&mut select, false);
        let names: Vec<&str> = select.symbols.iter().map(SelectSymbol::name).collect();
        assert_eq!(names, vec!["a", "A_0", "expr", "expr_0"]);
        assert_eq!(select.symbols[0].alias, None);
    }

    #[test]
    fn test_make_select_unique_expression_symbols_only() {
        let mut select = Select::new(vec![
            SelectSymbol::new(a()),
            SelectSymbol::new(a()),
            SelectSymbol::new(int(1)),
        ]);
        make_select_unique(&mut select, true);
        assert_eq!(select.symbols[1].alias, None);
        assert_eq!(select.symbols[2].alias.as_deref(), Some("expr"));
    }

    #[test]
    fn test_inline_view_converts_and_renames() {
        let metadata = MappingMetadata::new();
        let nested = select([a(), col("t", "b", DataType::String)]).from("t").build();
        let actual = vec![
            SelectSymbol::new(col("t2", "x", DataType::Long)),
            SelectSymbol::new(col("t2", "b", DataType::String)),
        ];
        let view = create_inline_view_query("pm1.t2", nested, &metadata, &actual).unwrap();
        assert_eq!(
            view.to_string(),
            "SELECT convert(pm1_t2_1.a, long) AS x, pm1_t2_1.b FROM (SELECT t.a, t.b FROM t) AS pm1_t2_1"
        );
        let registered = view.temp_metadata.get("PM1_T2_1").unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].canonical_name(), "PM1_T2_1.A");
    }

    #[test]
    fn test_inline_view_column_count_mismatch() {
        let metadata = MappingMetadata::new();
        let nested = select([a()]).from("t").build();
        let err = create_inline_view_query("X", nested, &metadata, &[]).unwrap_err();
        assert!(matches!(err, Error::Component(_)));
    }
}
