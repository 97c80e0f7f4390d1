//! The field-transform execution loop and its run report.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{error, info};

use super::mapper::TransformMapper;
use crate::content::ContentNode;
use crate::transform::{apply_transform, Direction, TransformContext};

/// Per-field outcome tally for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Fields whose value changed and was saved.
    pub success: u64,
    /// Fields that needed no change.
    pub unchanged: u64,
    /// Fields whose transform failed.
    pub map_errors: u64,
    /// Fields that changed but whose node could not be saved.
    pub save_errors: u64,
    /// Fields of nodes that failed for any other reason.
    pub other_errors: u64,
}

impl Counts {
    /// Add another tally into this one.
    pub fn merge(&mut self, other: &Counts) {
        self.success += other.success;
        self.unchanged += other.unchanged;
        self.map_errors += other.map_errors;
        self.save_errors += other.save_errors;
        self.other_errors += other.other_errors;
    }

    /// Sum of every outcome.
    pub fn total(&self) -> u64 {
        self.success + self.unchanged + self.map_errors + self.save_errors + self.other_errors
    }
}

/// Summary of one transform run, keyed by source name and field.
#[derive(Debug, Clone)]
pub struct TransformReport {
    direction: Direction,
    rows: BTreeMap<(String, String), Counts>,
}

impl TransformReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            rows: BTreeMap::new(),
        }
    }

    fn add(&mut self, source: &str, field: &str, counts: &Counts) {
        self.rows
            .entry((source.to_string(), field.to_string()))
            .or_default()
            .merge(counts);
    }

    /// Direction the run went in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Tally for one source and field.
    pub fn counts(&self, source: &str, field: &str) -> Option<&Counts> {
        self.rows.get(&(source.to_string(), field.to_string()))
    }

    /// Tally across every row.
    pub fn totals(&self) -> Counts {
        let mut totals = Counts::default();
        for counts in self.rows.values() {
            totals.merge(counts);
        }
        totals
    }

    /// Iterate rows as `(source, field, counts)`.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &Counts)> {
        self.rows
            .iter()
            .map(|((source, field), counts)| (source.as_str(), field.as_str(), counts))
    }

    /// Whether no node was visited.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for TransformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "No data transformed");
        }

        let source_width = self
            .rows
            .keys()
            .map(|(s, _)| s.len())
            .chain([8])
            .max()
            .unwrap_or(8);
        let field_width = self
            .rows
            .keys()
            .map(|(_, f)| f.len())
            .chain([5])
            .max()
            .unwrap_or(5);

        writeln!(f, "Transformed the following ({}):", self.direction)?;
        writeln!(
            f,
            "{:<sw$} {:<fw$} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Doc Type",
            "Field",
            "Success",
            "Unchanged",
            "Map Errors",
            "Save Errors",
            "Other Errors",
            sw = source_width,
            fw = field_width
        )?;
        for ((source, field), c) in &self.rows {
            writeln!(
                f,
                "{:<sw$} {:<fw$} {:>12} {:>12} {:>12} {:>12} {:>12}",
                source,
                field,
                c.success,
                c.unchanged,
                c.map_errors,
                c.save_errors,
                c.other_errors,
                sw = source_width,
                fw = field_width
            )?;
        }
        Ok(())
    }
}

/// Applies field mappings to every sourced node and saves what changed.
///
/// A failure on one field or one node never stops the run.
pub struct TransformRunner<'a> {
    ctx: TransformContext<'a>,
}

impl<'a> TransformRunner<'a> {
    /// Create a runner.
    pub fn new(ctx: TransformContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run every mapper in `direction` and log the report.
    pub fn run(&self, mappers: &[Box<dyn TransformMapper>], direction: Direction) -> TransformReport {
        let mut report = TransformReport::new(direction);

        for mapper in mappers {
            let source_name = mapper.source().source_name().to_string();

            for item in mapper.source().contents(self.ctx.repository) {
                match item {
                    Ok(node) => {
                        let counts = self.remap(mapper.as_ref(), node, direction);
                        for (field, c) in &counts {
                            report.add(&source_name, field, c);
                        }
                    }
                    Err(e) => {
                        error!(
                            source = %source_name,
                            %direction,
                            error = %e,
                            "Could not enumerate content"
                        );
                        let failed = Counts {
                            other_errors: 1,
                            ..Default::default()
                        };
                        for mapping in mapper.field_mappings() {
                            report.add(&source_name, &mapping.field, &failed);
                        }
                    }
                }
            }
        }

        info!("{}", report);
        report
    }

    fn remap(
        &self,
        mapper: &dyn TransformMapper,
        mut node: ContentNode,
        direction: Direction,
    ) -> Vec<(String, Counts)> {
        let source_name = mapper.source().source_name();
        let mut counts: Vec<(String, Counts)> = Vec::with_capacity(mapper.field_mappings().len());

        let state = match mapper.retrieve_pre_change_state(&node) {
            Ok(state) => state,
            Err(e) => {
                error!(
                    source = %source_name,
                    node_id = node.id,
                    %direction,
                    error = %e,
                    "Could not read pre-change state"
                );
                let failed = Counts {
                    other_errors: 1,
                    ..Default::default()
                };
                counts.extend(mapper.field_mappings().iter().map(|m| (m.field.clone(), failed)));
                return counts;
            }
        };

        let mut node_changed = false;
        for mapping in mapper.field_mappings() {
            let mut field_counts = Counts::default();
            let mut changed = false;
            let mut failed = false;

            for migration in &mapping.migrations {
                let transform = migration.transform(direction);
                match apply_transform(transform, &self.ctx, &mut node, &mapping.field) {
                    Ok(c) => changed |= c,
                    Err(e) => {
                        failed = true;
                        error!(
                            source = %source_name,
                            node_id = node.id,
                            field = %mapping.field,
                            transform = transform.name(),
                            %direction,
                            error = %e,
                            "Could not map field"
                        );
                    }
                }
            }

            if failed {
                field_counts.map_errors += 1;
            } else if changed {
                field_counts.success += 1;
            } else {
                field_counts.unchanged += 1;
            }
            node_changed |= changed;
            counts.push((mapping.field.clone(), field_counts));
        }

        if !node_changed {
            return counts;
        }

        if let Err(e) = mapper.save_changes(self.ctx.repository, &node, &state) {
            for (_, c) in counts.iter_mut() {
                c.save_errors += c.success;
                c.success = 0;
            }
            error!(
                source = %source_name,
                node_id = node.id,
                %direction,
                error = %e,
                "Could not save content"
            );
        }

        counts
    }
}
