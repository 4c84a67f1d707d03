use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use renoplan_contracts::dashboard::AssetKind;
use renoplan_contracts::error::{AssetGenerationError, PlanGenerationError, ServiceError};
use renoplan_contracts::events::{EventPayload, SessionLog};
use renoplan_contracts::intake::{ImageAsset, IntakeList};
use renoplan_contracts::plan::RenovationPlan;
use renoplan_contracts::property::{validate_plan_inputs, EfficiencyClass, PropertyDetails};
use renoplan_engine::{
    decode_image, dryrun_image, dryrun_plan, short_id, AssetService, PlanService, ResolutionTier,
    DEFAULT_IMAGE_MODEL, DEFAULT_PLAN_MODEL,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "renoplan", version, about = "AI renovation planning assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a renovation plan from property facts and photos.
    Plan(PlanArgs),
    /// Generate a photorealistic visualization for one plan phase.
    Visualize(AssetArgs),
    /// Generate a technical blueprint for one plan phase.
    Blueprint(AssetArgs),
    /// Export the plan as a markdown summary document.
    Export(ExportArgs),
}

#[derive(Debug, Parser)]
struct PlanArgs {
    #[arg(long)]
    address: String,
    /// Floor area in square meters.
    #[arg(long)]
    floor_area: f64,
    /// Renovation budget in EUR.
    #[arg(long)]
    budget: f64,
    /// Current energy-efficiency class (A-H).
    #[arg(long)]
    efficiency: String,
    /// Property photo; repeat for multiple images.
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = DEFAULT_PLAN_MODEL)]
    model: String,
    /// Request timeout in seconds, clamped to 5-300.
    #[arg(long)]
    timeout: Option<f64>,
    /// Generate a deterministic offline plan instead of calling the service.
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct AssetArgs {
    /// Session file written by `plan` (plan.json).
    #[arg(long)]
    plan: PathBuf,
    /// Zero-based phase index.
    #[arg(long)]
    phase: usize,
    /// Resolution tier (1K, 2K, or 4K). Blueprints always render at 1K.
    #[arg(long, default_value = "2K")]
    tier: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    model: String,
    /// Request timeout in seconds, clamped to 5-300.
    #[arg(long)]
    timeout: Option<f64>,
    /// Generate a deterministic offline image instead of calling the service.
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Session file written by `plan` (plan.json).
    #[arg(long)]
    plan: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

/// Everything `plan` knows at the end of a successful run; `visualize`,
/// `blueprint`, and `export` all start from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    property: PropertyDetails,
    plan: RenovationPlan,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("renoplan error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => run_plan(args),
        Command::Visualize(args) => run_asset(AssetKind::Visualization, args),
        Command::Blueprint(args) => run_asset(AssetKind::Blueprint, args),
        Command::Export(args) => run_export(args),
    }
}

fn run_plan(args: PlanArgs) -> Result<()> {
    let efficiency_class: EfficiencyClass = args
        .efficiency
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let details = PropertyDetails {
        address: args.address.clone(),
        floor_area_sqm: args.floor_area,
        budget_eur: args.budget,
        efficiency_class,
    };

    let mut intake = IntakeList::new();
    for path in &args.images {
        match ImageAsset::from_path(path)? {
            Some(asset) => intake.push(asset),
            None => eprintln!("skipping {} (unsupported image type)", path.display()),
        }
    }

    if let Err(err) = validate_plan_inputs(&details, intake.assets()) {
        bail!("invalid plan inputs: {err}");
    }

    fs::create_dir_all(&args.out)?;
    let log = SessionLog::begin(events_path(&args.out, args.events.as_deref()))?;
    log.emit(
        "plan_requested",
        payload(json!({
            "address": details.address,
            "image_count": intake.len(),
            "model": args.model,
            "dryrun": args.dryrun,
        })),
    )?;

    let plan = if args.dryrun {
        dryrun_plan(&details)
    } else {
        let mut service = PlanService::new();
        service.set_model(&args.model);
        if let Some(seconds) = args.timeout {
            service.set_timeout_seconds(seconds);
        }
        match service.generate_plan(&details, intake.assets()) {
            Ok(plan) => plan,
            Err(err) => {
                log.emit(
                    "plan_failed",
                    payload(json!({ "error": err.to_string() })),
                )?;
                bail!(
                    "plan generation failed: {err} ({})",
                    plan_failure_hint(&err)
                );
            }
        }
    };

    let session_path = args.out.join("plan.json");
    write_session(&session_path, &details, &plan)?;
    log.emit(
        "plan_generated",
        payload(json!({
            "path": session_path.to_string_lossy(),
            "phases": plan.phases.len(),
            "total_cost": plan.total_cost,
            "total_duration_weeks": plan.total_duration_weeks,
        })),
    )?;

    println!(
        "Plan for {} written to {}",
        details.address,
        session_path.display()
    );
    println!("  building style: {}", plan.building_style);
    println!(
        "  {} phases, {} EUR total, {} weeks",
        plan.phases.len(),
        plan.total_cost,
        plan.total_duration_weeks
    );
    Ok(())
}

fn run_asset(kind: AssetKind, args: AssetArgs) -> Result<()> {
    let tier: ResolutionTier = args.tier.parse().map_err(|err: String| anyhow::anyhow!(err))?;
    let session = load_session(&args.plan)?;
    let Some(phase) = session.plan.phases.get(args.phase) else {
        bail!(
            "phase index {} out of range (plan has {} phases)",
            args.phase,
            session.plan.phases.len()
        );
    };

    fs::create_dir_all(&args.out)?;
    let log = SessionLog::begin(events_path(&args.out, args.events.as_deref()))?;
    log.emit(
        "asset_requested",
        payload(json!({
            "phase": args.phase,
            "kind": kind.as_str(),
            "tier": tier.label(),
            "model": args.model,
            "dryrun": args.dryrun,
        })),
    )?;

    let result = if args.dryrun {
        let prompt = format!(
            "{} {} {}",
            kind.as_str(),
            phase.description,
            session.plan.building_style
        );
        let (width, height) = match kind {
            AssetKind::Visualization => (1280, 720),
            AssetKind::Blueprint => (1024, 768),
        };
        dryrun_image(width, height, &prompt)
    } else {
        let mut service = AssetService::new();
        service.set_model(&args.model);
        if let Some(seconds) = args.timeout {
            service.set_timeout_seconds(seconds);
        }
        match kind {
            AssetKind::Visualization => service.generate_visualization(
                &phase.description,
                &session.plan.building_style,
                tier,
            ),
            AssetKind::Blueprint => service.generate_blueprint(
                &phase.name,
                &phase.description,
                &session.plan.building_style,
            ),
        }
    };

    let decoded = result.and_then(|image| Ok((decode_image(&image)?, image)));
    let (bytes, image) = match decoded {
        Ok(pair) => pair,
        Err(err) => {
            log.emit(
                "asset_failed",
                payload(json!({
                    "phase": args.phase,
                    "kind": kind.as_str(),
                    "error": err.to_string(),
                })),
            )?;
            bail!(
                "{} generation failed: {err} ({})",
                kind.as_str(),
                asset_failure_hint(&err)
            );
        }
    };

    let file_name = format!(
        "{}-phase{}-{}.{}",
        kind.as_str(),
        args.phase,
        short_id(&phase.description),
        extension_for_mime(&image.mime_type)
    );
    let written = args.out.join(file_name);
    fs::write(&written, bytes)
        .with_context(|| format!("failed to write {}", written.display()))?;
    log.emit(
        "asset_generated",
        payload(json!({
            "phase": args.phase,
            "kind": kind.as_str(),
            "path": written.to_string_lossy(),
        })),
    )?;
    println!(
        "{} for phase {} ({}) written to {}",
        kind.as_str(),
        args.phase,
        phase.name,
        written.display()
    );
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let session = load_session(&args.plan)?;
    let markdown = render_plan_markdown(&session.property, &session.plan);
    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&args.out, markdown)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    if let Some(events) = &args.events {
        let log = SessionLog::begin(events)?;
        log.emit(
            "export_written",
            payload(json!({ "path": args.out.to_string_lossy() })),
        )?;
    }

    println!("Exported plan summary to {}", args.out.display());
    Ok(())
}

fn render_plan_markdown(details: &PropertyDetails, plan: &RenovationPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Renovation plan: {}\n\n", details.address));
    out.push_str(&format!("{}\n\n", plan.summary));

    out.push_str("## Property\n\n");
    out.push_str(&format!("- Floor area: {} sqm\n", details.floor_area_sqm));
    out.push_str(&format!("- Budget: {} EUR\n", details.budget_eur));
    out.push_str(&format!(
        "- Energy efficiency class: {}\n",
        details.efficiency_class
    ));
    out.push_str(&format!("- Building style: {}\n\n", plan.building_style));

    out.push_str("## Phases\n\n");
    for (index, phase) in plan.phases.iter().enumerate() {
        out.push_str(&format!(
            "{}. **{}** ({} weeks, {} EUR)\n   {}\n",
            index + 1,
            phase.name,
            phase.duration_weeks,
            phase.cost_estimate,
            phase.description
        ));
    }
    out.push('\n');

    out.push_str("## ROI projection\n\n");
    for metric in &plan.roi_projection {
        out.push_str(&format!(
            "- Year {}: {} EUR cumulative\n",
            metric.year, metric.value
        ));
    }
    out.push('\n');

    out.push_str("## CO2 savings\n\n");
    for metric in &plan.co2_savings {
        out.push_str(&format!(
            "- {}: {} t/a ({})\n",
            metric.category, metric.saving_tons, metric.description
        ));
    }
    out.push('\n');

    out.push_str("## Funding programs\n\n");
    for badge in &plan.funding {
        out.push_str(&format!(
            "- **{}** ({}): {}\n",
            badge.name, badge.amount, badge.description
        ));
    }
    out.push('\n');

    out.push_str("## Totals\n\n");
    out.push_str(&format!("- Total cost: {} EUR\n", plan.total_cost));
    out.push_str(&format!(
        "- Total duration: {} weeks\n",
        plan.total_duration_weeks
    ));
    out
}

fn write_session(path: &Path, details: &PropertyDetails, plan: &RenovationPlan) -> Result<()> {
    let session = SessionFile {
        property: details.clone(),
        plan: plan.clone(),
    };
    fs::write(path, serde_json::to_string_pretty(&session)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn load_session(path: &Path) -> Result<SessionFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading session file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("session file {} is not a valid plan session", path.display()))
}

fn events_path(out: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out.join("events.jsonl"))
}

fn payload(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn plan_failure_hint(err: &PlanGenerationError) -> &'static str {
    match err {
        PlanGenerationError::Service(err) => service_failure_hint(err),
        PlanGenerationError::EmptyResponse | PlanGenerationError::MalformedPayload { .. } => {
            "the model returned an unusable plan; rerun the command to try again"
        }
    }
}

fn asset_failure_hint(err: &AssetGenerationError) -> &'static str {
    match err {
        AssetGenerationError::Service(err) => service_failure_hint(err),
        AssetGenerationError::NoImageProduced | AssetGenerationError::BadImageData { .. } => {
            "the model produced no usable image; rerun the command to try again"
        }
    }
}

fn service_failure_hint(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::MissingCredential => "set GEMINI_API_KEY or GOOGLE_API_KEY and retry",
        ServiceError::Http { status, .. } if *status == 401 || *status == 403 => {
            "check the API key"
        }
        ServiceError::Http { status, .. } if *status == 429 => {
            "API quota exhausted; wait before retrying"
        }
        _ => "check network connectivity and retry",
    }
}
