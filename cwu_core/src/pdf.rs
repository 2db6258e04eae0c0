//! # PDF Generation Module
//!
//! Renders a resident's loss statement and a full audit report with Typst.
//!
//! ## Architecture
//!
//! - Typst templates are embedded as string constants
//! - Data is injected via `{{PLACEHOLDER}}` replacement before compilation
//! - Fonts come from `typst-assets` and are loaded once per process
//! - Output is raw PDF bytes (`Vec<u8>`)
//!
//! Layout is deliberately plain; the numbers are what matter.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cwu_core::calculations::resident_loss::{compute_resident_loss, ResidentBillingRecord};
//! use cwu_core::pdf::render_resident_statement;
//!
//! let record = ResidentBillingRecord {
//!     billed_price_per_m3: 65.0,
//!     monthly_consumption_m3: 3.5,
//!     cold_temp_c: 8.0,
//!     hot_temp_c: 55.0,
//!     city_heat_price_per_gj: 82.13,
//! };
//! let result = compute_resident_loss(&record).unwrap();
//! let pdf = render_resident_statement(&record, &result, "Flat 12").unwrap();
//! std::fs::write("statement.pdf", pdf).unwrap();
//! ```

use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::debug;
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_pdf::PdfOptions;

use crate::calculations::modernization::{Payback, VariantSet};
use crate::calculations::resident_loss::{ResidentBillingRecord, ResidentLossResult};
use crate::calculations::CalculationOutput;
use crate::errors::{CalcError, CalcResult};
use crate::report::AuditReport;

// ============================================================================
// Typst World Implementation
// ============================================================================

static FONTS: Lazy<Vec<Font>> = Lazy::new(|| {
    typst_assets::fonts()
        .flat_map(|bytes| Font::iter(Bytes::new(bytes.to_vec())))
        .collect()
});

/// A minimal Typst world for compiling documents without external files.
struct PdfWorld {
    main: Source,
    book: LazyHash<FontBook>,
    library: LazyHash<Library>,
}

impl PdfWorld {
    fn new(source: String) -> Self {
        PdfWorld {
            main: Source::detached(source),
            book: LazyHash::new(FontBook::from_fonts(FONTS.iter())),
            library: LazyHash::new(Library::default()),
        }
    }
}

impl World for PdfWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        FONTS.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        let now = Utc::now();
        Datetime::from_ymd(
            now.format("%Y").to_string().parse().ok()?,
            now.format("%m").to_string().parse().ok()?,
            now.format("%d").to_string().parse().ok()?,
        )
    }
}

/// Compile Typst source to PDF bytes.
fn compile_pdf(source: String) -> CalcResult<Vec<u8>> {
    let world = PdfWorld::new(source);
    let warned = typst::compile(&world);

    let document = warned.output.map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::RenderError {
            reason: format!("Typst compilation failed: {}", msgs.join("; ")),
        }
    })?;

    let bytes = typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::RenderError {
            reason: format!("PDF rendering failed: {}", msgs.join("; ")),
        }
    })?;

    debug!(bytes = bytes.len(), "pdf rendered");
    Ok(bytes)
}

// ============================================================================
// PDF Templates
// ============================================================================

const PAGE_SETUP: &str = r##"
#set page(
  paper: "a4",
  margin: (top: 2cm, bottom: 2cm, left: 2cm, right: 2cm),
  footer: context [
    #line(length: 100%, stroke: 0.5pt + gray)
    #v(4pt)
    #grid(
      columns: (1fr, 1fr, 1fr),
      align(left)[#text(size: 9pt)[{{FOOTER_LEFT}}]],
      align(center)[#text(size: 9pt)[Page #counter(page).display()]],
      align(right)[#text(size: 9pt)[{{DATE}}]],
    )
  ]
)

#set text(size: 11pt)
"##;

/// Typst template for a resident's loss statement
const RESIDENT_TEMPLATE: &str = r##"
#align(center)[
  #block(width: 100%, fill: rgb("#f0f0f0"), inset: 12pt, radius: 4pt)[
    #text(size: 18pt, weight: "bold")[Hot Water Bill Check]
    #v(4pt)
    #text(size: 14pt)[{{RESIDENT}}]
  ]
]

#v(12pt)

== Bill Data

#table(
  columns: (1fr, auto, auto),
  inset: 8pt,
  stroke: 0.5pt,
  align: (left, right, left),
  table.header([*Parameter*], [*Value*], [*Unit*]),
  [Billed price], [{{BILLED}}], [PLN/m#super[3]],
  [Monthly consumption], [{{CONSUMPTION}}], [m#super[3]],
  [Cold water], [{{COLD}}], [°C],
  [Hot water], [{{HOT}}], [°C],
  [District heat price], [{{HEAT_PRICE}}], [PLN/GJ],
)

#v(12pt)

== Theoretical Cost

$ E = 0.004186 dot Delta T = {{ENERGY}} "GJ/m"^3 $

$ C = E dot p_"heat" = {{THEORETICAL}} "PLN/m"^3 $

#v(12pt)

== Loss

#table(
  columns: (1fr, auto, auto),
  inset: 8pt,
  stroke: 0.5pt,
  align: (left, right, left),
  table.header([*Item*], [*Value*], [*Unit*]),
  [Loss per m#super[3]], [{{LOSS_M3}}], [PLN/m#super[3]],
  [Energy loss per m#super[3]], [{{ELOSS_M3}}], [GJ/m#super[3]],
  [Monthly financial loss], [{{MONTHLY_LOSS}}], [PLN],
  [Monthly energy loss], [{{MONTHLY_ELOSS}}], [GJ],
  [Yearly financial loss], [{{YEARLY_LOSS}}], [PLN],
  [Yearly energy loss], [{{YEARLY_ELOSS}}], [GJ],
  [Theoretical monthly payment], [{{THEORETICAL_PAY}}], [PLN],
  [Actual monthly payment], [{{ACTUAL_PAY}}], [PLN],
)

#v(16pt)

#align(center)[
  #block(width: auto, fill: {{VERDICT_COLOR}}, inset: 16pt, radius: 4pt)[
    #text(size: 14pt, weight: "bold")[{{VERDICT}}]
  ]
]

{{NOTES}}
"##;

// ============================================================================
// PDF Rendering Functions
// ============================================================================

/// Render a resident's loss statement.
///
/// # Arguments
///
/// * `record` - The bill data
/// * `result` - Output of `compute_resident_loss` for that bill
/// * `resident` - Resident or flat label printed in the title
pub fn render_resident_statement(
    record: &ResidentBillingRecord,
    result: &ResidentLossResult,
    resident: &str,
) -> CalcResult<Vec<u8>> {
    let date = Utc::now().format("%Y-%m-%d").to_string();
    let (verdict, color) = if result.is_underbilled() {
        ("Billed below theoretical heat cost", "rgb(\"#d4edda\")")
    } else {
        ("Billed above theoretical heat cost", "rgb(\"#f8d7da\")")
    };
    let notes = if result.warnings.is_empty() {
        String::new()
    } else {
        warning_notes(result.warnings.iter().map(|w| w.code()))
    };

    let source = String::from(PAGE_SETUP)
        .replace("{{FOOTER_LEFT}}", "Hot water bill check")
        .replace("{{DATE}}", &date)
        + &RESIDENT_TEMPLATE
            .replace("{{RESIDENT}}", &escape_typst(resident))
            .replace("{{BILLED}}", &format!("{:.2}", record.billed_price_per_m3))
            .replace("{{CONSUMPTION}}", &format!("{:.2}", record.monthly_consumption_m3))
            .replace("{{COLD}}", &format!("{:.1}", record.cold_temp_c))
            .replace("{{HOT}}", &format!("{:.1}", record.hot_temp_c))
            .replace("{{HEAT_PRICE}}", &format!("{:.2}", record.city_heat_price_per_gj))
            .replace("{{ENERGY}}", &format!("{:.4}", result.energy_per_m3_gj))
            .replace("{{THEORETICAL}}", &format!("{:.2}", result.theoretical_cost_per_m3))
            .replace("{{LOSS_M3}}", &format!("{:.2}", result.loss_per_m3))
            .replace("{{ELOSS_M3}}", &format!("{:.4}", result.energy_loss_per_m3_gj))
            .replace("{{MONTHLY_LOSS}}", &format!("{:.2}", result.monthly_financial_loss))
            .replace("{{MONTHLY_ELOSS}}", &format!("{:.3}", result.monthly_energy_loss_gj))
            .replace("{{YEARLY_LOSS}}", &format!("{:.2}", result.yearly_financial_loss))
            .replace("{{YEARLY_ELOSS}}", &format!("{:.3}", result.yearly_energy_loss_gj))
            .replace("{{THEORETICAL_PAY}}", &format!("{:.2}", result.theoretical_monthly_payment))
            .replace("{{ACTUAL_PAY}}", &format!("{:.2}", result.actual_monthly_payment))
            .replace("{{VERDICT_COLOR}}", color)
            .replace("{{VERDICT}}", verdict)
            .replace("{{NOTES}}", &notes);

    compile_pdf(source)
}

/// Render every entry of an audit report into one PDF.
///
/// Fails with `InvalidInput` when the report has no entries.
pub fn render_report_pdf(report: &AuditReport) -> CalcResult<Vec<u8>> {
    if report.entries.is_empty() {
        return Err(CalcError::invalid_input(
            "entries",
            "[]",
            "Report has no calculations to export",
        ));
    }

    let mut source = String::from(PAGE_SETUP)
        .replace("{{FOOTER_LEFT}}", &format!("Job: {}", escape_typst(&report.meta.job_id)))
        .replace("{{DATE}}", &Utc::now().format("%Y-%m-%d").to_string());

    source.push_str(&format!(
        r##"
#align(center)[
  #block(width: 100%, fill: rgb("#f0f0f0"), inset: 20pt, radius: 4pt)[
    #text(size: 22pt, weight: "bold")[Hot Water Installation Audit]
    #v(8pt)
    #text(size: 16pt)[{building}]
  ]
]

#v(16pt)

#table(
  columns: (auto, 1fr),
  stroke: none,
  row-gutter: 4pt,
  [Auditor:], [{auditor}],
  [Job ID:], [{job_id}],
  [Created:], [{created}],
)

#v(16pt)

== Contents

#table(
  columns: (auto, 1fr, auto),
  inset: 8pt,
  stroke: 0.5pt,
  align: (left, left, left),
  table.header([*No.*], [*Title*], [*Calculation*]),
{summary_rows}
)
"##,
        building = escape_typst(&report.meta.building),
        auditor = escape_typst(&report.meta.auditor),
        job_id = escape_typst(&report.meta.job_id),
        created = report.meta.created.format("%Y-%m-%d"),
        summary_rows = report
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!(
                "  [{}], [{}], [{}],",
                i + 1,
                escape_typst(&e.title),
                e.item.calc_type()
            ))
            .collect::<Vec<_>>()
            .join("\n"),
    ));

    for (i, entry) in report.entries.iter().enumerate() {
        source.push_str(&format!(
            "\n#pagebreak()\n\n= {}. {}\n\n{}\n",
            i + 1,
            escape_typst(&entry.title),
            value_table(&output_rows(&entry.output)),
        ));
        if let CalculationOutput::Variants(set) = &entry.output {
            source.push_str(&variant_table(set));
        }
        if let CalculationOutput::Audit(audit) = &entry.output {
            source.push_str("\n== Modernization Variants\n\n");
            source.push_str(&variant_table(&audit.variants));
            source.push_str("\n== Recommendations\n\n");
            for line in &audit.technical.recommendations {
                source.push_str(&format!("- {}\n", escape_typst(line)));
            }
        }
    }

    compile_pdf(source)
}

/// One table row: label, formatted value, unit.
type Row = (&'static str, String, &'static str);

fn output_rows(output: &CalculationOutput) -> Vec<Row> {
    match output {
        CalculationOutput::OccupancyPower(r) => vec![
            ("Residents", format!("{:.0}", r.occupants), ""),
            ("Average daily demand", format!("{:.2}", r.average_daily_demand_m3), "m³/day"),
            ("Peak hourly flow", format!("{:.3}", r.peak_hourly_flow_m3h), "m³/h"),
            ("Average power", format!("{:.1}", r.average_power_kw), "kW"),
            ("Peak power without tank", format!("{:.1}", r.peak_power_without_tank_kw), "kW"),
            ("Tank equivalent power", format!("{:.1}", r.tank_equivalent_power_kw), "kW"),
            ("Required source power", format!("{:.1}", r.required_source_power_kw), "kW"),
        ],
        CalculationOutput::BuildingPower(r) => vec![
            ("Instantaneous flow", format!("{:.2}", r.instantaneous_flow_m3h), "m³/h"),
            ("Power without losses", format!("{:.1}", r.power_no_loss_kw), "kW"),
            ("Power with circulation loss", format!("{:.1}", r.power_with_circulation_loss_kw), "kW"),
            ("Recommended ordered power", format!("{:.0}", r.recommended_ordered_power_kw), "kW"),
        ],
        CalculationOutput::PeakDraw(r) => vec![
            ("Usage profile", r.simult_profile.as_str().to_string(), ""),
            ("Simultaneity", format!("{:.3}", r.simultaneity), ""),
            ("ΔT", format!("{:.1}", r.delta_t_k), "K"),
            ("Peak power", format!("{:.1}", r.power_kw), "kW"),
            ("Buffer energy", format!("{:.2}", r.buffer_energy_kwh), "kWh"),
            ("Net power", format!("{:.1}", r.net_power_kw), "kW"),
        ],
        CalculationOutput::Circulation(r) => {
            vec![("Annual circulation loss", format!("{:.3}", r.annual_loss_gj), "GJ")]
        }
        CalculationOutput::ResidentLoss(r) => vec![
            ("Energy per m³", format!("{:.4}", r.energy_per_m3_gj), "GJ/m³"),
            ("Theoretical cost", format!("{:.2}", r.theoretical_cost_per_m3), "PLN/m³"),
            ("Loss per m³", format!("{:.2}", r.loss_per_m3), "PLN/m³"),
            ("Yearly financial loss", format!("{:.2}", r.yearly_financial_loss), "PLN"),
            ("Yearly energy loss", format!("{:.3}", r.yearly_energy_loss_gj), "GJ"),
        ],
        CalculationOutput::Modernization(r) => vec![
            ("Loss after modernization", format!("{:.2}", r.post_loss_pct), "%"),
            ("Energy after modernization", format!("{:.2}", r.post_annual_energy_gj), "GJ"),
        ],
        CalculationOutput::Variants(set) => vec![(
            "Mean annual savings",
            format!("{:.0}", set.mean_savings_pln()),
            "PLN",
        )],
        CalculationOutput::Balance(b) => vec![
            ("Theoretical need", format!("{:.2}", b.need_gj), "GJ"),
            ("Purchased heat", format!("{:.2}", b.purchased_gj), "GJ"),
            ("Circulation model", b.circulation_model.name().to_string(), ""),
            ("Circulation loss", format!("{:.2}", b.circulation_gj), "GJ"),
            ("Useful heat", format!("{:.2}", b.useful_gj), "GJ"),
            ("Heat cost", format!("{:.2}", b.cost_pln), "PLN"),
            ("Payments minus cost", format!("{:.2}", b.diff_pln), "PLN"),
        ],
        CalculationOutput::Audit(a) => vec![
            ("Ordered power", format!("{:.1}", a.power.ordered_power_kw), "kW"),
            ("Method", a.power.method.clone(), ""),
            ("Circulation model", a.circulation_model.name().to_string(), ""),
            ("Circulation loss", format!("{:.3}", a.circulation_loss_gj), "GJ"),
            ("Current loss cost", format!("{:.0}", a.economics.current_cost_pln), "PLN/year"),
            ("Potential savings", format!("{:.0}", a.economics.potential_savings_pln), "PLN/year"),
            ("Advice", a.economics.recommendation.description().to_string(), ""),
            ("CO₂", format!("{:.0}", a.economics.co2_reduction_kg), "kg/year"),
            ("Efficiency", format!("{:.1}", a.technical.efficiency_pct), "%"),
            ("Rating", a.technical.system_rating.as_str().to_string(), ""),
        ],
        CalculationOutput::TankSimulation(r) => vec![
            ("Average hot-water power", format!("{:.2}", r.average_power_kw), "kW"),
            ("Standing loss", format!("{:.2}", r.loss_kw), "kW"),
            ("Power, mixed tank", format!("{:.1}", r.mixed.ordered_power_kw), "kW"),
            ("Power, layered tank", format!("{:.1}", r.layered.ordered_power_kw), "kW"),
            ("Difference", format!("{:.1} ({:.1} %)", r.delta_power_kw, r.delta_power_pct), "kW"),
            ("Recommendation", r.recommendation.level.title().to_string(), ""),
            ("Ordered power", format!("{:.1}", r.ordered_power_kw), "kW"),
            ("Decision basis", r.decision_basis.as_str().to_string(), ""),
            ("Extra cost of mixed-model power", format!("{:.0}", r.financial.extra_cost_year_pln), "PLN/year"),
        ],
    }
}

fn value_table(rows: &[Row]) -> String {
    let body = rows
        .iter()
        .map(|(label, value, unit)| format!("  [{}], [{}], [{}],", label, escape_typst(value), unit))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "#table(\n  columns: (1fr, auto, auto),\n  inset: 8pt,\n  stroke: 0.5pt,\n  align: (left, right, left),\n  table.header([*Item*], [*Value*], [*Unit*]),\n{body}\n)\n"
    )
}

fn variant_table(set: &VariantSet) -> String {
    let body = set
        .variants
        .iter()
        .map(|v| {
            let payback = match v.payback {
                Payback::Years(y) => format!("{y:.1}"),
                Payback::Never => "never".to_string(),
            };
            format!(
                "  [{}], [{:.0}], [{:.0}], [{:.0}], [{}], [{:.0}],",
                v.label, v.reduction_pct, v.investment_cost_pln, v.annual_savings_pln, payback, v.npv_10_years_pln
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "\n#table(\n  columns: (1fr, auto, auto, auto, auto, auto),\n  inset: 6pt,\n  stroke: 0.5pt,\n  align: (left, right, right, right, right, right),\n  table.header([*Variant*], [*Reduction %*], [*Capex PLN*], [*Savings PLN/yr*], [*Payback yr*], [*10-yr net PLN*]),\n{body}\n)\n"
    )
}

fn warning_notes<'a>(codes: impl Iterator<Item = &'a str>) -> String {
    let mut notes = String::from("\n#v(12pt)\n#text(size: 9pt, fill: gray)[Notes:");
    for code in codes {
        notes.push_str(&format!(" {}", escape_typst(code)));
    }
    notes.push_str("]\n");
    notes
}

/// Escape special Typst characters in user-provided text
fn escape_typst(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '*' => "\\*".to_string(),
            '_' => "\\_".to_string(),
            '#' => "\\#".to_string(),
            '$' => "\\$".to_string(),
            '@' => "\\@".to_string(),
            '<' => "\\<".to_string(),
            '>' => "\\>".to_string(),
            '[' => "\\[".to_string(),
            ']' => "\\]".to_string(),
            '\\' => "\\\\".to_string(),
            '`' => "\\`".to_string(),
            _ => c.to_string(),
        })
        .collect()
}
