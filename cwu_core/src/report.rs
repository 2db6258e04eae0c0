//! # Audit Report
//!
//! The `AuditReport` collects the calculations run for one building, with
//! their results, under a header identifying the auditor and the job.
//!
//! ## Structure
//!
//! ```text
//! AuditReport
//! ├── meta: ReportMetadata (version, auditor, building, job id, timestamps)
//! ├── settings: Settings (the tunables the entries were computed with)
//! └── entries: Vec<ReportEntry> (id, title, input, output)
//! ```
//!
//! Entries keep insertion order so a rendered report reads in the order the
//! auditor worked.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::{CalculationItem, CirculationModel};
//! use cwu_core::report::AuditReport;
//!
//! let mut report = AuditReport::new("J. Kowalska", "ul. Lipowa 12", "26-014");
//! let id = report
//!     .add_entry(
//!         "Circulation loss",
//!         CalculationItem::Circulation(CirculationModel::Percentage {
//!             purchased_gj: 800.0,
//!             circulation_pct: 25.0,
//!         }),
//!     )
//!     .unwrap();
//! assert!(report.get_entry(&id).is_some());
//!
//! let json = report.to_json().unwrap();
//! assert!(json.contains("ul. Lipowa 12"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::calculations::{CalculationItem, CalculationOutput};
use crate::errors::CalcResult;
use crate::settings::Settings;

/// Current schema version of serialized reports
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Root report container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub meta: ReportMetadata,

    /// Settings every entry was computed with
    pub settings: Settings,

    /// Calculations in the order they were added
    pub entries: Vec<ReportEntry>,
}

impl AuditReport {
    /// Create an empty report with default settings.
    ///
    /// # Arguments
    ///
    /// * `auditor` - Name of the responsible auditor
    /// * `building` - Building address or name
    /// * `job_id` - Job number (e.g., "26-001")
    pub fn new(auditor: impl Into<String>, building: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self::with_settings(auditor, building, job_id, Settings::default())
    }

    /// Create an empty report computed with the given settings.
    pub fn with_settings(
        auditor: impl Into<String>,
        building: impl Into<String>,
        job_id: impl Into<String>,
        settings: Settings,
    ) -> Self {
        let now = Utc::now();
        AuditReport {
            meta: ReportMetadata {
                version: SCHEMA_VERSION.to_string(),
                auditor: auditor.into(),
                building: building.into(),
                job_id: job_id.into(),
                created: now,
                modified: now,
            },
            settings,
            entries: Vec::new(),
        }
    }

    /// Run a calculation and append it with its result.
    ///
    /// Nothing is added when the calculation fails.
    pub fn add_entry(&mut self, title: impl Into<String>, item: CalculationItem) -> CalcResult<Uuid> {
        let output = item.run(&self.settings)?;
        let id = Uuid::new_v4();
        let title = title.into();
        debug!(%id, title = %title, calc_type = item.calc_type(), "report entry added");
        self.entries.push(ReportEntry {
            id,
            title,
            item,
            output,
        });
        self.touch();
        Ok(id)
    }

    /// Remove an entry by id, returning it if it existed.
    pub fn remove_entry(&mut self, id: &Uuid) -> Option<ReportEntry> {
        let index = self.entries.iter().position(|e| e.id == *id)?;
        let entry = self.entries.remove(index);
        self.touch();
        Some(entry)
    }

    pub fn get_entry(&self, id: &Uuid) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.id == *id)
    }

    /// Re-run every entry, e.g. after the settings changed.
    ///
    /// All-or-nothing: if any entry fails, no output is replaced and the
    /// modified timestamp is left alone.
    pub fn recompute(&mut self) -> CalcResult<()> {
        let outputs = self
            .entries
            .iter()
            .map(|entry| entry.item.run(&self.settings))
            .collect::<CalcResult<Vec<_>>>()?;
        for (entry, output) in self.entries.iter_mut().zip(outputs) {
            entry.output = output;
        }
        self.touch();
        Ok(())
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> CalcResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report from JSON.
    pub fn from_json(json: &str) -> CalcResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Report header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    pub auditor: String,

    /// Building address or name
    pub building: String,

    pub job_id: String,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

/// One calculation in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: Uuid,
    pub title: String,
    pub item: CalculationItem,
    pub output: CalculationOutput,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::modernization::VariantInput;
    use crate::calculations::ordered_power::PowerRounding;
    use crate::calculations::BuildingPowerInput;

    fn building_power() -> CalculationItem {
        CalculationItem::BuildingPower(BuildingPowerInput {
            flats: 50,
            persons_per_flat: 2.7,
            peak_use_per_person_l_h: 30.0,
            hot_temp_c: 55.0,
            cold_temp_c: 8.0,
            circulation_loss_pct: 20.0,
            safety_margin_pct: 15.0,
        })
    }

    #[test]
    fn test_report_creation() {
        let report = AuditReport::new("J. Kowalska", "ul. Lipowa 12", "26-014");
        assert_eq!(report.meta.auditor, "J. Kowalska");
        assert_eq!(report.meta.version, SCHEMA_VERSION);
        assert_eq!(report.entry_count(), 0);
    }

    #[test]
    fn test_add_remove_entry() {
        let mut report = AuditReport::new("A", "B", "C");
        let first = report.add_entry("Power", building_power()).unwrap();
        let second = report
            .add_entry(
                "Variants",
                CalculationItem::Variants(VariantInput {
                    circulation_loss_gj: 100.0,
                    price_per_gj: 60.0,
                }),
            )
            .unwrap();
        assert_eq!(report.entries[0].id, first);
        assert_eq!(report.entries[1].id, second);

        assert!(report.remove_entry(&first).is_some());
        assert!(report.remove_entry(&first).is_none());
        assert_eq!(report.entry_count(), 1);
    }

    #[test]
    fn test_failed_calculation_not_added() {
        let mut report = AuditReport::new("A", "B", "C");
        let item = CalculationItem::Variants(VariantInput {
            circulation_loss_gj: -1.0,
            price_per_gj: 60.0,
        });
        assert!(report.add_entry("Bad", item).is_err());
        assert_eq!(report.entry_count(), 0);
    }

    #[test]
    fn test_recompute_after_settings_change() {
        let mut report = AuditReport::new("A", "B", "C");
        report.add_entry("Power", building_power()).unwrap();
        report.settings.power_rounding = PowerRounding::CeilToStep { step_kw: 10.0 };
        report.recompute().unwrap();
        match &report.entries[0].output {
            CalculationOutput::BuildingPower(r) => assert_eq!(r.recommended_ordered_power_kw, 310.0),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_failed_recompute_leaves_report_untouched() {
        let mut report = AuditReport::new("A", "B", "C");
        report.add_entry("Power", building_power()).unwrap();
        report
            .add_entry(
                "Variants",
                CalculationItem::Variants(VariantInput {
                    circulation_loss_gj: 100.0,
                    price_per_gj: 60.0,
                }),
            )
            .unwrap();
        report.add_entry("Power again", building_power()).unwrap();
        let before = report.meta.modified;

        // power entries would change, the variants entry now fails
        report.settings.power_rounding = PowerRounding::CeilToStep { step_kw: 10.0 };
        report.settings.modernization_tiers.clear();
        assert_eq!(report.recompute().unwrap_err().error_code(), "INVALID_INPUT");

        assert_eq!(report.meta.modified, before);
        for index in [0, 2] {
            match &report.entries[index].output {
                CalculationOutput::BuildingPower(r) => assert_eq!(r.recommended_ordered_power_kw, 305.0),
                other => panic!("unexpected output {other:?}"),
            }
        }
        assert!(matches!(report.entries[1].output, CalculationOutput::Variants(_)));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut report = AuditReport::new("Jane Auditor", "Block 7", "26-042");
        report.add_entry("Power", building_power()).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"type\": \"BuildingPower\""));
        let back = AuditReport::from_json(&json).unwrap();
        assert_eq!(back.meta.building, "Block 7");
        assert_eq!(back.entries.len(), 1);
    }
}
