use crate::{emit_success, OutputMode};
use cpg_sema::config::{write_config, SemaConfig};
use cpg_sema::types::RecordBinding;
use cpg_sema::ui::{self, languages_table, stats_table, Icons, LanguageRow, Severity};
use cpg_sema::{Error, Session, SessionOptions, TypeId};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;

/// `--record Name:Super1,Super2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub name: String,
    pub super_types: Vec<String>,
}

pub fn parse_record_spec(text: &str) -> Result<RecordSpec, String> {
    let (name, supers) = match text.split_once(':') {
        Some((name, supers)) => (name, supers),
        None => (text, ""),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("record spec '{}' has no name", text));
    }

    let super_types = supers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok(RecordSpec {
        name: name.to_string(),
        super_types,
    })
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub input: String,
    pub language: String,
    pub rendered: String,
    pub variant: String,
    pub reference_depth: usize,
    pub qualifiers: Vec<&'static str>,
    pub storage: String,
    pub diagnostics: Vec<DiagnosticEntry>,
}

#[derive(Debug, Serialize)]
pub struct CommonReport {
    pub inputs: Vec<String>,
    pub language: String,
    pub common: Option<String>,
    pub diagnostics: Vec<DiagnosticEntry>,
}

fn session_for(config: &SemaConfig, language: Option<&str>) -> anyhow::Result<(Session, String)> {
    let language = language
        .map(str::to_string)
        .or_else(|| config.default_language.clone())
        .unwrap_or_else(|| "cpp".to_string());

    let registry = config.language_registry();
    let Some(table) = registry.find(&language) else {
        return Err(Error::UnknownLanguage(language).into());
    };
    let name = table.name.clone();

    let mut session = Session::new(registry, SessionOptions::from(config));
    session.set_language(Some(&name));
    Ok((session, name))
}

#[derive(Debug, Serialize)]
pub struct DiagnosticEntry {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip)]
    pub severity: Severity,
}

fn diagnostics_of(session: &Session) -> Vec<DiagnosticEntry> {
    session
        .diagnostics
        .iter()
        .map(|d| DiagnosticEntry {
            kind: d.kind(),
            message: d.to_string(),
            severity: Severity::of(d),
        })
        .collect()
}

pub fn parse_report(config: &SemaConfig, text: &str, language: Option<&str>) -> anyhow::Result<ParseReport> {
    let (mut session, language) = session_for(config, language)?;
    let ty = session.parse_type(text, None);
    let resolved = session.types.get(ty);

    Ok(ParseReport {
        input: text.to_string(),
        rendered: session.types.display(ty),
        variant: resolved.variant().to_string(),
        reference_depth: session.types.reference_depth(ty),
        qualifiers: resolved.qualifier.keywords(),
        storage: resolved.storage.to_string(),
        diagnostics: diagnostics_of(&session),
        language,
    })
}

pub fn common_report(
    config: &SemaConfig,
    inputs: &[String],
    records: &[RecordSpec],
    language: Option<&str>,
) -> anyhow::Result<CommonReport> {
    let (mut session, language) = session_for(config, language)?;
    for record in records {
        session.types.register_record(
            RecordBinding::new(record.name.clone(), None)
                .with_super_types(record.super_types.clone())
                .with_language(Some(&language)),
        );
    }

    let types: Vec<TypeId> = inputs.iter().map(|t| session.parse_type(t, None)).collect();
    let common = session.types.common_type(&types).map(|t| session.types.display(t));

    Ok(CommonReport {
        inputs: inputs.to_vec(),
        language,
        common,
        diagnostics: diagnostics_of(&session),
    })
}

pub fn run_parse(output_mode: OutputMode, config: &SemaConfig, text: &str, language: Option<&str>) -> anyhow::Result<()> {
    let report = parse_report(config, text, language)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "parse", report);
    }

    ui::header(&format!("Parsed '{}' as {}", report.input, report.language));
    let depth = report.reference_depth.to_string();
    let qualifiers = if report.qualifiers.is_empty() {
        "-".to_string()
    } else {
        report.qualifiers.join(" ")
    };
    println!(
        "{}",
        stats_table(&[
            ("Type", &report.rendered),
            ("Variant", &report.variant),
            ("Reference depth", &depth),
            ("Qualifiers", &qualifiers),
            ("Storage", &report.storage),
        ])
    );
    for diagnostic in &report.diagnostics {
        ui::diagnostic(diagnostic.severity, &diagnostic.message);
    }
    Ok(())
}

pub fn run_common(
    output_mode: OutputMode,
    config: &SemaConfig,
    inputs: &[String],
    records: &[RecordSpec],
    language: Option<&str>,
) -> anyhow::Result<()> {
    let report = common_report(config, inputs, records, language)?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "common", report);
    }

    ui::header(&format!("Common type of {} inputs ({})", report.inputs.len(), report.language));
    for record in records {
        ui::summary_row(
            &format!("{} {}", Icons::LINK, record.name),
            &record.super_types.join(", "),
        );
    }
    match &report.common {
        Some(common) => ui::success(&format!("Common type: {}", ui::type_name(common))),
        None => ui::warn("Common type: none"),
    }
    for diagnostic in &report.diagnostics {
        ui::diagnostic(diagnostic.severity, &diagnostic.message);
    }
    Ok(())
}

pub fn run_languages(output_mode: OutputMode, config: &SemaConfig) -> anyhow::Result<()> {
    let registry = config.language_registry();
    let rows: Vec<LanguageRow> = registry.languages().iter().map(LanguageRow::from).collect();
    if !output_mode.is_human() {
        return emit_success(output_mode, "languages", rows);
    }

    ui::section(" Languages ");
    println!("{}", languages_table(&rows));
    if let Some(default) = &config.default_language {
        ui::info("Default", default);
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, path: &Path, force: bool) -> anyhow::Result<()> {
    let config = SemaConfig::default();
    if let Err(e) = write_config(path, &config, force) {
        if output_mode.is_human() {
            ui::error(&e.to_string());
        }
        return Err(e);
    }

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display().bold()));
        Ok(())
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "path": path.display().to_string() }))
    }
}
