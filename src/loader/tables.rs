//! Per-table `LoaderRecord` impls and `write_batch` wiring over
//! `Database::upsert_*`, FK-ordered the way the corpus is produced:
//! structure -> sections -> refs -> obligations -> similarities ->
//! classifications -> reporting -> anachronisms -> implementation
//! (spec §4.7 "Multi-table loaders").

use crate::storage::{Database, UpsertCounts};
use crate::types::{
    AnachronismAnalysis, Classification, CrossReference, ImplementationAnalysis, Indicator,
    Obligation, ReportingRecord, Result, Section, SimilarityPair, StructureNode,
};

use super::driver::LoaderRecord;

impl LoaderRecord for StructureNode {}

impl LoaderRecord for Section {
    fn validate(&self) -> Option<String> {
        if self.id.0.is_empty() {
            Some("section id must not be empty".to_string())
        } else {
            None
        }
    }
}

impl LoaderRecord for CrossReference {}

impl LoaderRecord for Obligation {}

impl LoaderRecord for SimilarityPair {
    fn validate(&self) -> Option<String> {
        if self.section_a == self.section_b {
            Some("similarity pair must relate two distinct sections".to_string())
        } else {
            None
        }
    }
}

impl LoaderRecord for Classification {}

impl LoaderRecord for ReportingRecord {}
impl LoaderRecord for AnachronismAnalysis {}
impl LoaderRecord for ImplementationAnalysis {}

pub fn write_structure(db: &Database, batch: &[StructureNode]) -> Result<UpsertCounts> {
    db.upsert_structure(batch)
}

pub fn write_sections(db: &Database, batch: &[Section]) -> Result<UpsertCounts> {
    db.upsert_sections(batch)
}

/// `refs` are already jurisdiction-scoped per NDJSON file, so the
/// jurisdiction tag travels alongside the loader invocation, not the
/// record itself.
pub fn write_section_refs(jurisdiction: &str) -> impl Fn(&Database, &[CrossReference]) -> Result<UpsertCounts> + '_ {
    move |db, batch| db.upsert_section_refs(jurisdiction, batch)
}

pub fn write_obligations(jurisdiction: &str) -> impl Fn(&Database, &[Obligation]) -> Result<UpsertCounts> + '_ {
    move |db, batch| db.upsert_obligations(jurisdiction, batch)
}

pub fn write_similarities(jurisdiction: &str) -> impl Fn(&Database, &[SimilarityPair]) -> Result<UpsertCounts> + '_ {
    move |db, batch| db.upsert_similarities(jurisdiction, batch)
}

pub fn write_classifications(jurisdiction: &str) -> impl Fn(&Database, &[Classification]) -> Result<UpsertCounts> + '_ {
    move |db, batch| db.upsert_classifications(jurisdiction, batch)
}

/// The three indicator-bearing tables have no natural batch `UpsertCounts`
/// (each record replaces one section's indicator set rather than
/// inserting rows with a trackable delta), so every successfully written
/// record counts as one insert.
pub fn write_reporting(jurisdiction: &str) -> impl Fn(&Database, &[ReportingRecord]) -> Result<UpsertCounts> + '_ {
    move |db, batch| write_indicator_batch(batch, |section_id, indicators| {
        db.upsert_reporting(jurisdiction, section_id, indicators)
    })
}

pub fn write_anachronisms(jurisdiction: &str) -> impl Fn(&Database, &[AnachronismAnalysis]) -> Result<UpsertCounts> + '_ {
    move |db, batch| write_indicator_batch(batch, |section_id, indicators| {
        db.upsert_anachronisms(jurisdiction, section_id, indicators)
    })
}

pub fn write_implementation(jurisdiction: &str) -> impl Fn(&Database, &[ImplementationAnalysis]) -> Result<UpsertCounts> + '_ {
    move |db, batch| write_indicator_batch(batch, |section_id, indicators| {
        db.upsert_implementation(jurisdiction, section_id, indicators)
    })
}

trait IndicatorRecord {
    fn section_id(&self) -> &str;
    fn indicators(&self) -> &[Indicator];
}

impl IndicatorRecord for ReportingRecord {
    fn section_id(&self) -> &str {
        &self.section_id.0
    }
    fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }
}

impl IndicatorRecord for AnachronismAnalysis {
    fn section_id(&self) -> &str {
        &self.section_id.0
    }
    fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }
}

impl IndicatorRecord for ImplementationAnalysis {
    fn section_id(&self) -> &str {
        &self.section_id.0
    }
    fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }
}

fn write_indicator_batch<T: IndicatorRecord>(
    batch: &[T],
    mut write_one: impl FnMut(&str, &[Indicator]) -> Result<()>,
) -> Result<UpsertCounts> {
    for record in batch {
        write_one(record.section_id(), record.indicators())?;
    }
    Ok(UpsertCounts {
        inserted: batch.len(),
        updated: 0,
    })
}
