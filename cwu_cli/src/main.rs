//! # CWU CLI
//!
//! JSON in, JSON out. Reads one tagged request (from a file or stdin),
//! runs it through `cwu_core` and prints the response envelope on stdout.
//!
//! ```text
//! echo '{"kind":"variants","circLossGJ":150}' | cwu_cli --pretty
//! cwu_cli audit.json --config cwu.toml --pdf audit.pdf
//! ```
//!
//! Logs go to stderr; filter them with `CWU_LOG` (or `RUST_LOG`).

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::exit;

use clap::{App, AppSettings, Arg, ArgMatches};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use cwu_core::calculations::resident_loss::compute_resident_loss;
use cwu_core::calculations::CalculationItem;
use cwu_core::pdf::{render_report_pdf, render_resident_statement};
use cwu_core::{respond, ApiResponse, AuditReport, CalcError, CalcRequest, Settings};

fn init_logging() {
    let filter = EnvFilter::try_from_env("CWU_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&str>) -> io::Result<String> {
    match path {
        None | Some("-") => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
        Some(path) => fs::read_to_string(path),
    }
}

/// Exit code for a failed calculation.
fn error_exit_code(err: &CalcError) -> i32 {
    match err {
        CalcError::InvalidInput { .. }
        | CalcError::MissingField { .. }
        | CalcError::PhysicalConstraint { .. }
        | CalcError::SerializationError { .. } => exitcode::DATAERR,
        CalcError::ConfigError { .. } => exitcode::CONFIG,
        _ => exitcode::SOFTWARE,
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool, out: &mut dyn Write) -> i32 {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match text {
        Ok(text) => match writeln!(out, "{}", text) {
            Ok(()) => exitcode::OK,
            Err(err) => {
                error!(%err, "could not write response");
                exitcode::IOERR
            }
        },
        Err(err) => {
            error!(%err, "could not serialize response");
            exitcode::SOFTWARE
        }
    }
}

/// Render the PDF for a successful request.
///
/// A resident loss request becomes a resident statement; anything else
/// becomes a one-entry audit report.
fn export_pdf(
    request: &CalcRequest,
    settings: &Settings,
    matches: &ArgMatches<'_>,
    out: &Path,
) -> Result<(), CalcError> {
    let title = matches.value_of("title").unwrap_or("Hot water calculation");
    let item = request.to_item(settings)?;

    let bytes = match item {
        CalculationItem::ResidentLoss(record) => {
            let result = compute_resident_loss(&record)?;
            render_resident_statement(&record, &result, title)?
        }
        item => {
            let mut report = AuditReport::with_settings(
                matches.value_of("auditor").unwrap_or(""),
                matches.value_of("building").unwrap_or(""),
                matches.value_of("job").unwrap_or(""),
                settings.clone(),
            );
            report.add_entry(title, item)?;
            render_report_pdf(&report)?
        }
    };

    fs::write(out, &bytes).map_err(|e| CalcError::RenderError {
        reason: format!("could not write {}: {}", out.display(), e),
    })?;
    info!(path = %out.display(), bytes = bytes.len(), "pdf written");
    Ok(())
}

fn build_app() -> App<'static, 'static> {
    App::new("cwu_cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Domestic hot water energy, cost and ordered-power calculator")
        .setting(AppSettings::NextLineHelp)
        .arg(Arg::with_name("input")
            .value_name("REQUEST_JSON")
            .help("Request file; reads stdin when absent or '-'")
            .index(1))
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .value_name("SETTINGS_TOML")
            .help("Engine settings file")
            .takes_value(true))
        .arg(Arg::with_name("pdf")
            .long("pdf")
            .value_name("OUTPUT_PDF")
            .help("Also render the result as a PDF")
            .takes_value(true))
        .arg(Arg::with_name("title")
            .long("title")
            .value_name("TITLE")
            .help("Resident name or section title printed in the PDF")
            .takes_value(true))
        .arg(Arg::with_name("auditor")
            .long("auditor")
            .value_name("NAME")
            .takes_value(true))
        .arg(Arg::with_name("building")
            .long("building")
            .value_name("ADDRESS")
            .takes_value(true))
        .arg(Arg::with_name("job")
            .long("job")
            .value_name("JOB_ID")
            .takes_value(true))
        .arg(Arg::with_name("pretty")
            .short("p")
            .long("pretty")
            .help("Pretty-print the JSON response"))
}

/// Handle one request text and return the process exit code.
fn run(matches: &ArgMatches<'_>, text: &str, out: &mut dyn Write) -> i32 {
    let pretty = matches.is_present("pretty");

    let settings = match matches.value_of("config") {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                error!(%err, "invalid settings");
                return exitcode::CONFIG;
            }
        },
        None => Settings::default(),
    };

    let request: CalcRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(err) => {
            let response = ApiResponse {
                ok: false,
                result: None,
                error: Some(CalcError::from(err)),
            };
            let code = print_json(&response, pretty, out);
            return if code == exitcode::OK { exitcode::DATAERR } else { code };
        }
    };
    debug!(?request, "request parsed");

    let response = respond(&request, &settings);
    let code = print_json(&response, pretty, out);
    if code != exitcode::OK {
        return code;
    }
    if let Some(err) = &response.error {
        return error_exit_code(err);
    }

    if let Some(path) = matches.value_of("pdf") {
        if let Err(err) = export_pdf(&request, &settings, matches, Path::new(path)) {
            error!(%err, "pdf export failed");
            return error_exit_code(&err);
        }
    }

    exitcode::OK
}

fn main() {
    let matches = build_app().get_matches();
    init_logging();

    let text = match read_input(matches.value_of("input")) {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "could not read request");
            exit(if err.kind() == io::ErrorKind::NotFound {
                exitcode::NOINPUT
            } else {
                exitcode::IOERR
            });
        }
    };

    let code = run(&matches, &text, &mut io::stdout().lock());
    exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str], text: &str) -> (i32, serde_json::Value) {
        let matches = build_app().get_matches_from(std::iter::once("cwu_cli").chain(args.iter().copied()));
        let mut out = Vec::new();
        let code = run(&matches, text, &mut out);
        let json = serde_json::from_slice(&out).unwrap_or(serde_json::Value::Null);
        (code, json)
    }

    #[test]
    fn test_valid_request_exits_ok() {
        let (code, json) = run_args(&["--pretty"], r#"{"kind":"variants","circLossGJ":150}"#);
        assert_eq!(code, exitcode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["result"]["type"], "Variants");
    }

    #[test]
    fn test_malformed_json_is_data_error() {
        let (code, json) = run_args(&[], "{not json");
        assert_eq!(code, exitcode::DATAERR);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["type"], "SerializationError");
    }

    #[test]
    fn test_rejected_request_is_data_error() {
        let (code, json) = run_args(
            &[],
            r#"{"kind":"resident","waterM3":10,"coldTempC":50,"hotTempC":45,"residentPaymentsPLN":0}"#,
        );
        assert_eq!(code, exitcode::DATAERR);
        assert_eq!(json["ok"], false);
    }

    #[test]
    fn test_unknown_kind_is_data_error() {
        let (code, _) = run_args(&[], r#"{"kind":"weather"}"#);
        assert_eq!(code, exitcode::DATAERR);
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let (code, json) = run_args(
            &["--config", "/nonexistent/cwu.toml"],
            r#"{"kind":"variants","circLossGJ":150}"#,
        );
        assert_eq!(code, exitcode::CONFIG);
        assert_eq!(json, serde_json::Value::Null);
    }

    #[test]
    fn test_arguments_parse() {
        let matches = build_app().get_matches_from(vec![
            "cwu_cli", "req.json", "-c", "cwu.toml", "--pdf", "out.pdf", "--title", "Flat 12", "-p",
        ]);
        assert_eq!(matches.value_of("input"), Some("req.json"));
        assert_eq!(matches.value_of("config"), Some("cwu.toml"));
        assert_eq!(matches.value_of("pdf"), Some("out.pdf"));
        assert_eq!(matches.value_of("title"), Some("Flat 12"));
        assert!(matches.is_present("pretty"));
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(error_exit_code(&CalcError::missing_field("x")), exitcode::DATAERR);
        assert_eq!(error_exit_code(&CalcError::config_error("a.toml", "bad")), exitcode::CONFIG);
        assert_eq!(
            error_exit_code(&CalcError::calculation_failed("TankSimulation", "no power")),
            exitcode::SOFTWARE
        );
    }
}
