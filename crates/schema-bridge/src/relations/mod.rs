//! Relationship inference over discovered foreign keys.
//!
//! Relationships are derived from structural facts alone: every
//! foreign key yields a forward and a reverse relationship, and tables
//! that look like pure junctions collapse into many-to-many pairs. The
//! junction test is a heuristic with a tunable threshold, not a hard
//! law; a genuine data table with exactly two foreign keys can trip it.

use std::collections::{HashMap, HashSet};

use crate::core::schema::{RelationshipInfo, RelationshipKind, TableInfo};

/// Infers relationships, detects cycles, and validates foreign keys.
///
/// Stateless after construction; safe to share across discovery passes.
#[derive(Debug, Clone)]
pub struct RelationshipEngine {
    /// Maximum non-key, non-foreign-key columns a table may carry and
    /// still classify as a junction.
    junction_extra_columns: usize,
}

impl Default for RelationshipEngine {
    fn default() -> Self {
        Self {
            junction_extra_columns: 2,
        }
    }
}

impl RelationshipEngine {
    /// Override the junction extra-column threshold.
    pub fn with_junction_threshold(mut self, extra_columns: usize) -> Self {
        self.junction_extra_columns = extra_columns;
        self
    }

    /// Derive all relationships from the given tables.
    ///
    /// Recomputed in full on every call; never incremental.
    pub fn discover_relationships(&self, tables: &[TableInfo]) -> Vec<RelationshipInfo> {
        let by_name: HashMap<String, &TableInfo> = tables
            .iter()
            .map(|t| (t.name.to_lowercase(), t))
            .collect();

        let mut relationships = Vec::new();

        for table in tables {
            if self.is_junction(table) {
                relationships.extend(self.junction_relationships(table, &by_name));
                continue;
            }

            for fk in &table.foreign_keys {
                let referenced = by_name.get(&fk.referenced_table.to_lowercase());

                let to_column = if fk.referenced_column.is_empty() {
                    referenced
                        .and_then(|r| r.primary_key.first())
                        .cloned()
                        .unwrap_or_default()
                } else {
                    fk.referenced_column.clone()
                };

                let forward_kind = match referenced {
                    Some(r) if r.is_pk_column(&to_column) => RelationshipKind::ManyToOne,
                    _ => RelationshipKind::OneToMany,
                };

                relationships.push(RelationshipInfo {
                    name: format!("{}_via_{}", fk.referenced_table, fk.column),
                    kind: forward_kind,
                    from_table: table.name.clone(),
                    from_column: fk.column.clone(),
                    to_table: fk.referenced_table.clone(),
                    to_column: to_column.clone(),
                    junction_table: None,
                    junction_columns: None,
                });

                relationships.push(RelationshipInfo {
                    name: format!("{}_via_{}", table.name, fk.column),
                    kind: forward_kind.inverse(),
                    from_table: fk.referenced_table.clone(),
                    from_column: to_column,
                    to_table: table.name.clone(),
                    to_column: fk.column.clone(),
                    junction_table: None,
                    junction_columns: None,
                });
            }
        }

        relationships
    }

    /// A pure junction has exactly two foreign keys and at most
    /// `junction_extra_columns` columns that are neither key members
    /// nor foreign key columns (a created-at timestamp, say).
    fn is_junction(&self, table: &TableInfo) -> bool {
        if table.foreign_keys.len() != 2 {
            return false;
        }

        let fk_columns: HashSet<&str> = table
            .foreign_keys
            .iter()
            .map(|fk| fk.column.as_str())
            .collect();

        let extra = table
            .columns
            .iter()
            .filter(|c| !c.is_primary_key && !fk_columns.contains(c.name.as_str()))
            .count();

        extra <= self.junction_extra_columns
    }

    fn junction_relationships(
        &self,
        junction: &TableInfo,
        by_name: &HashMap<String, &TableInfo>,
    ) -> Vec<RelationshipInfo> {
        let fk_a = &junction.foreign_keys[0];
        let fk_b = &junction.foreign_keys[1];

        let resolve = |fk: &crate::core::schema::ForeignKeyInfo| {
            if fk.referenced_column.is_empty() {
                by_name
                    .get(&fk.referenced_table.to_lowercase())
                    .and_then(|r| r.primary_key.first())
                    .cloned()
                    .unwrap_or_default()
            } else {
                fk.referenced_column.clone()
            }
        };
        let col_a = resolve(fk_a);
        let col_b = resolve(fk_b);

        vec![
            RelationshipInfo {
                name: format!(
                    "{}_{}_via_{}",
                    fk_a.referenced_table, fk_b.referenced_table, junction.name
                ),
                kind: RelationshipKind::ManyToMany,
                from_table: fk_a.referenced_table.clone(),
                from_column: col_a.clone(),
                to_table: fk_b.referenced_table.clone(),
                to_column: col_b.clone(),
                junction_table: Some(junction.name.clone()),
                junction_columns: Some((fk_a.column.clone(), fk_b.column.clone())),
            },
            RelationshipInfo {
                name: format!(
                    "{}_{}_via_{}",
                    fk_b.referenced_table, fk_a.referenced_table, junction.name
                ),
                kind: RelationshipKind::ManyToMany,
                from_table: fk_b.referenced_table.clone(),
                from_column: col_b,
                to_table: fk_a.referenced_table.clone(),
                to_column: col_a,
                junction_table: Some(junction.name.clone()),
                junction_columns: Some((fk_b.column.clone(), fk_a.column.clone())),
            },
        ]
    }

    /// Report every back-edge in the foreign-key graph as a cycle path.
    ///
    /// Diagnostic only: self-referencing and mutually-referencing
    /// tables are legal schemas and are never rejected. The traversal
    /// uses an explicit stack, so adversarial graphs cannot exhaust the
    /// call stack.
    pub fn detect_cycles(&self, tables: &[TableInfo]) -> Vec<String> {
        let adjacency: HashMap<&str, Vec<&str>> = tables
            .iter()
            .map(|t| {
                let mut refs: Vec<&str> = t
                    .foreign_keys
                    .iter()
                    .map(|fk| fk.referenced_table.as_str())
                    .collect();
                refs.sort_unstable();
                refs.dedup();
                (t.name.as_str(), refs)
            })
            .collect();

        let mut cycles = Vec::new();
        let mut finished: HashSet<&str> = HashSet::new();

        for start in tables.iter().map(|t| t.name.as_str()) {
            if finished.contains(start) {
                continue;
            }

            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            let mut path: Vec<&str> = vec![start];
            let mut on_path: HashSet<&str> = HashSet::from([start]);

            while let Some(&(node, idx)) = stack.last() {
                let neighbors = adjacency
                    .get(node)
                    .map(|v| v.as_slice())
                    .unwrap_or_default();

                if idx < neighbors.len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let next = neighbors[idx];

                    if on_path.contains(next) {
                        let pos = path.iter().position(|n| *n == next).unwrap_or(0);
                        let mut cycle: Vec<&str> = path[pos..].to_vec();
                        cycle.push(next);
                        cycles.push(cycle.join(" -> "));
                    } else if !finished.contains(next) && adjacency.contains_key(next) {
                        stack.push((next, 0));
                        path.push(next);
                        on_path.insert(next);
                    }
                } else {
                    finished.insert(node);
                    stack.pop();
                    path.pop();
                    on_path.remove(node);
                }
            }
        }

        cycles
    }

    /// Validate foreign-key referential integrity.
    ///
    /// All violations are collected into the returned issue list;
    /// nothing is thrown.
    pub fn validate(&self, tables: &[TableInfo]) -> Vec<String> {
        let by_name: HashMap<String, &TableInfo> = tables
            .iter()
            .map(|t| (t.name.to_lowercase(), t))
            .collect();

        let mut issues = Vec::new();

        for table in tables {
            for fk in &table.foreign_keys {
                if table.column(&fk.column).is_none() {
                    issues.push(format!(
                        "Foreign key {} on table {} uses missing local column {}",
                        fk.name, table.name, fk.column
                    ));
                }

                let Some(referenced) = by_name.get(&fk.referenced_table.to_lowercase()) else {
                    issues.push(format!(
                        "Foreign key {} on table {} references missing table {}",
                        fk.name, table.name, fk.referenced_table
                    ));
                    continue;
                };

                if fk.referenced_column.is_empty() {
                    if referenced.primary_key.is_empty() {
                        issues.push(format!(
                            "Foreign key {} on table {} references the implicit key of {}, \
                             which has no primary key",
                            fk.name, table.name, fk.referenced_table
                        ));
                    }
                } else if referenced.column(&fk.referenced_column).is_none() {
                    issues.push(format!(
                        "Foreign key {} on table {} references missing column {}.{}",
                        fk.name, table.name, fk.referenced_table, fk.referenced_column
                    ));
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnInfo, ForeignKeyInfo};

    fn make_column(name: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: "INTEGER".to_string(),
            is_nullable: !pk,
            default_value: None,
            is_primary_key: pk,
            is_auto_increment: false,
            max_length: 0,
            precision: 0,
            scale: 0,
            ordinal_pos: 1,
        }
    }

    fn make_fk(name: &str, column: &str, referenced_table: &str) -> ForeignKeyInfo {
        ForeignKeyInfo {
            name: name.to_string(),
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: "id".to_string(),
            on_delete: "NO ACTION".to_string(),
            on_update: "NO ACTION".to_string(),
        }
    }

    fn make_table(name: &str, columns: Vec<ColumnInfo>, fks: Vec<ForeignKeyInfo>) -> TableInfo {
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        TableInfo {
            name: name.to_string(),
            schema: None,
            columns,
            primary_key,
            indexes: vec![],
            foreign_keys: fks,
            row_count: 0,
        }
    }

    fn entity(name: &str) -> TableInfo {
        make_table(
            name,
            vec![make_column("id", true), make_column("label", false)],
            vec![],
        )
    }

    fn junction(name: &str, a: &str, b: &str, extra: &[&str]) -> TableInfo {
        let mut columns = vec![
            make_column(&format!("{}_id", a), true),
            make_column(&format!("{}_id", b), true),
        ];
        for col in extra {
            columns.push(make_column(col, false));
        }
        make_table(
            name,
            columns,
            vec![
                make_fk("fk_a", &format!("{}_id", a), a),
                make_fk("fk_b", &format!("{}_id", b), b),
            ],
        )
    }

    #[test]
    fn test_junction_emits_two_many_to_many() {
        let tables = vec![
            entity("students"),
            entity("courses"),
            junction("enrollments", "students", "courses", &[]),
        ];

        let rels = RelationshipEngine::default().discover_relationships(&tables);
        let m2m: Vec<_> = rels
            .iter()
            .filter(|r| r.kind == RelationshipKind::ManyToMany)
            .collect();

        assert_eq!(m2m.len(), 2);
        assert_eq!(rels.len(), 2);

        let ab = m2m
            .iter()
            .find(|r| r.from_table == "students")
            .expect("students -> courses");
        assert_eq!(ab.to_table, "courses");
        assert_eq!(ab.junction_table.as_deref(), Some("enrollments"));
        assert_eq!(
            ab.junction_columns,
            Some(("students_id".to_string(), "courses_id".to_string()))
        );

        let ba = m2m.iter().find(|r| r.from_table == "courses").unwrap();
        assert_eq!(ba.to_table, "students");
    }

    #[test]
    fn test_junction_tolerates_extra_timestamp() {
        let tables = vec![
            entity("students"),
            entity("courses"),
            junction("enrollments", "students", "courses", &["enrolled_at"]),
        ];

        let rels = RelationshipEngine::default().discover_relationships(&tables);
        assert!(rels.iter().all(|r| r.kind == RelationshipKind::ManyToMany));
    }

    #[test]
    fn test_junction_threshold_is_tunable() {
        let tables = vec![
            entity("students"),
            entity("courses"),
            junction("enrollments", "students", "courses", &["enrolled_at"]),
        ];

        let strict = RelationshipEngine::default().with_junction_threshold(0);
        let rels = strict.discover_relationships(&tables);
        assert!(rels.iter().all(|r| r.kind != RelationshipKind::ManyToMany));
    }

    #[test]
    fn test_third_foreign_key_removes_junction_classification() {
        let tables = vec![
            entity("students"),
            entity("courses"),
            entity("terms"),
            make_table(
                "enrollments",
                vec![
                    make_column("students_id", true),
                    make_column("courses_id", true),
                    make_column("terms_id", false),
                ],
                vec![
                    make_fk("fk_a", "students_id", "students"),
                    make_fk("fk_b", "courses_id", "courses"),
                    make_fk("fk_c", "terms_id", "terms"),
                ],
            ),
        ];

        let rels = RelationshipEngine::default().discover_relationships(&tables);
        assert!(rels.iter().all(|r| r.kind != RelationshipKind::ManyToMany));
        // Three forward + three reverse.
        assert_eq!(rels.len(), 6);
    }

    #[test]
    fn test_forward_kind_depends_on_referenced_pk() {
        let mut orders = make_table(
            "orders",
            vec![make_column("id", true), make_column("customer_id", false)],
            vec![make_fk("fk_customer", "customer_id", "customers")],
        );
        orders.foreign_keys[0].referenced_column = "id".to_string();

        let tables = vec![entity("customers"), orders];
        let rels = RelationshipEngine::default().discover_relationships(&tables);

        let forward = rels
            .iter()
            .find(|r| r.from_table == "orders")
            .expect("forward relationship");
        assert_eq!(forward.kind, RelationshipKind::ManyToOne);

        let reverse = rels
            .iter()
            .find(|r| r.from_table == "customers")
            .expect("reverse relationship");
        assert_eq!(reverse.kind, RelationshipKind::OneToMany);
    }

    #[test]
    fn test_reverse_relationship_symmetry() {
        let tables = vec![
            entity("customers"),
            make_table(
                "orders",
                vec![
                    make_column("id", true),
                    make_column("customer_id", false),
                    make_column("total", false),
                ],
                vec![make_fk("fk_customer", "customer_id", "customers")],
            ),
        ];

        let rels = RelationshipEngine::default().discover_relationships(&tables);
        assert_eq!(rels.len(), 2);

        for rel in &rels {
            let mirrors: Vec<_> = rels
                .iter()
                .filter(|other| {
                    other.from_table == rel.to_table
                        && other.to_table == rel.from_table
                        && other.from_column == rel.to_column
                        && other.to_column == rel.from_column
                        && other.kind == rel.kind.inverse()
                })
                .collect();
            assert_eq!(mirrors.len(), 1, "relationship {:?} lacks a mirror", rel.name);
        }
    }

    #[test]
    fn test_self_reference_cycle() {
        let tables = vec![make_table(
            "employees",
            vec![make_column("id", true), make_column("manager_id", false)],
            vec![make_fk("fk_manager", "manager_id", "employees")],
        )];

        let cycles = RelationshipEngine::default().detect_cycles(&tables);
        assert_eq!(cycles, vec!["employees -> employees"]);
    }

    #[test]
    fn test_mutual_reference_cycle() {
        let tables = vec![
            make_table(
                "users",
                vec![make_column("id", true), make_column("team_id", false)],
                vec![make_fk("fk_team", "team_id", "teams")],
            ),
            make_table(
                "teams",
                vec![make_column("id", true), make_column("owner_id", false)],
                vec![make_fk("fk_owner", "owner_id", "users")],
            ),
        ];

        let cycles = RelationshipEngine::default().detect_cycles(&tables);
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].contains("users") && cycles[0].contains("teams"));
    }

    #[test]
    fn test_acyclic_graph_reports_nothing() {
        let tables = vec![
            entity("customers"),
            make_table(
                "orders",
                vec![make_column("id", true), make_column("customer_id", false)],
                vec![make_fk("fk_customer", "customer_id", "customers")],
            ),
        ];
        assert!(RelationshipEngine::default().detect_cycles(&tables).is_empty());
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut bad_fk = make_fk("fk_ghost", "ghost_col", "phantoms");
        bad_fk.referenced_column = "id".to_string();

        let mut bad_col_fk = make_fk("fk_badcol", "customer_id", "customers");
        bad_col_fk.referenced_column = "missing".to_string();

        let tables = vec![
            entity("customers"),
            make_table(
                "orders",
                vec![make_column("id", true), make_column("customer_id", false)],
                vec![bad_fk, bad_col_fk],
            ),
        ];

        let issues = RelationshipEngine::default().validate(&tables);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("fk_ghost") && issues[0].contains("ghost_col"));
        assert!(issues[1].contains("fk_ghost") && issues[1].contains("phantoms"));
        assert!(issues[2].contains("fk_badcol") && issues[2].contains("customers.missing"));
    }

    #[test]
    fn test_validation_passes_clean_schema() {
        let tables = vec![
            entity("customers"),
            make_table(
                "orders",
                vec![make_column("id", true), make_column("customer_id", false)],
                vec![make_fk("fk_customer", "customer_id", "customers")],
            ),
        ];
        assert!(RelationshipEngine::default().validate(&tables).is_empty());
    }
}
