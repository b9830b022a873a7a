//! Command-line surface
//!
//! Thin argument-parsing shells around the core contracts; no
//! pipeline logic lives here. Video composition and upload are
//! external stages and have no subcommand.

use clap::{Args, Parser, Subcommand};
use longplay_common::config::{Settings, StoreBackend};
use longplay_common::model::SessionPlan;
use longplay_common::time::{self, format_timestamp};
use std::path::PathBuf;
use std::sync::Arc;

use crate::acquire::TrackAcquirer;
use crate::library::ContentIndex;
use crate::mix::MixOptions;
use crate::planner::oracle::{ChatOracle, PlanningOracle};
use crate::planner::SessionPlanner;
use crate::providers::{ElevenLabsProvider, StableAudioProvider};
use crate::session::{self, SessionRunner};
use crate::store::{BlobStore, FsStore, HttpStore};

#[derive(Parser)]
#[command(
    name = "longplay",
    version,
    about = "Plan, generate, and mix long-form music sessions"
)]
pub struct Cli {
    /// Config file (defaults to ~/.config/longplay/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview a session plan without acquiring any audio
    Plan(PlanArgs),
    /// Plan a session and acquire every track, without mixing
    Generate(PlanArgs),
    /// Full pipeline: plan, acquire, mix, upload
    Run(PlanArgs),
    /// Re-mix the tracks already in a session directory
    Mix(MixArgs),
    /// Library inspection
    #[command(subcommand)]
    Library(LibraryCommand),
}

#[derive(Args)]
pub struct PlanArgs {
    /// Session concept: genre, vibe, purpose
    pub concept: String,

    /// Target total duration in minutes
    #[arg(long, default_value_t = 60)]
    pub duration: u32,

    /// Exclude library tracks used within this many days
    #[arg(long, default_value_t = 7)]
    pub exclude_days: i64,

    /// Skip the library entirely; generate every slot
    #[arg(long)]
    pub no_reuse: bool,
}

#[derive(Args)]
pub struct MixArgs {
    /// Session directory containing track_NN audio files
    pub session_dir: PathBuf,

    /// Override the configured crossfade length
    #[arg(long)]
    pub crossfade_ms: Option<u64>,

    /// Skip the global peak-normalization pass
    #[arg(long)]
    pub no_normalize: bool,
}

#[derive(Subcommand)]
pub enum LibraryCommand {
    /// List candidate tracks for a genre
    List {
        genre: String,

        /// Exclude tracks used within this many days (0 lists everything)
        #[arg(long, default_value_t = 0)]
        exclude_days: i64,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Plan(args) => {
            let plan = make_plan(&settings, &args).await?;
            print_plan(&plan);
        }
        Command::Generate(args) => {
            let plan = make_plan(&settings, &args).await?;
            print_plan(&plan);

            let store = build_store(&settings);
            let acquirer = build_acquirer(&settings, store);
            let session_id = session::new_session_id(time::now());
            let session_dir = settings.output_dir.join(&session_id);
            tokio::fs::create_dir_all(&session_dir).await?;
            tokio::fs::write(
                session_dir.join("plan.json"),
                serde_json::to_vec_pretty(&plan)?,
            )
            .await?;

            let tracks = acquirer.acquire_all(&plan, &session_id, &session_dir).await?;
            println!("Acquired {} tracks into {}", tracks.len(), session_dir.display());
            println!("Mix when ready: longplay mix {}", session_dir.display());
        }
        Command::Run(args) => {
            let plan = make_plan(&settings, &args).await?;
            print_plan(&plan);

            let store = build_store(&settings);
            let acquirer = build_acquirer(&settings, store.clone());
            let runner = SessionRunner::new(
                store,
                acquirer,
                settings.output_dir.clone(),
                MixOptions::from(&settings.mix),
            );
            let outcome = runner.run(&plan).await?;

            println!("\nSession {} complete", outcome.session_id);
            println!(
                "  Reused: {}  Generated: {}  Cost: ${:.2}",
                outcome.reused_count, outcome.generated_count, outcome.actual_cost_usd
            );
            println!(
                "  Mix: {} ({})",
                outcome.mix.output_path.display(),
                format_timestamp(outcome.mix.total_duration_ms)
            );
            print_tracklist(&outcome.mix.tracklist);
        }
        Command::Mix(args) => {
            let mut options = MixOptions::from(&settings.mix);
            if let Some(crossfade_ms) = args.crossfade_ms {
                options.crossfade_ms = crossfade_ms;
            }
            if args.no_normalize {
                options.normalize = false;
            }

            let report = session::mix_session_dir(&args.session_dir, &options)?;
            println!(
                "Mixed {} tracks into {} ({})",
                report.tracklist.len(),
                report.output_path.display(),
                format_timestamp(report.total_duration_ms)
            );
            print_tracklist(&report.tracklist);
        }
        Command::Library(LibraryCommand::List {
            genre,
            exclude_days,
            limit,
        }) => {
            let index = ContentIndex::new(build_store(&settings));
            let tracks = index.query(&genre, exclude_days, limit, time::now()).await?;
            if tracks.is_empty() {
                println!("No candidate tracks for '{}'", genre);
                return Ok(());
            }
            println!("{} candidate tracks for '{}':", tracks.len(), genre);
            for track in tracks {
                println!(
                    "  {}  {:<28} {:>3.0} BPM  energy {}  {}  used {}x",
                    track.id,
                    track.title,
                    track.bpm,
                    track.energy,
                    format_timestamp(track.duration_ms),
                    track.usage_count,
                );
            }
        }
    }
    Ok(())
}

async fn make_plan(settings: &Settings, args: &PlanArgs) -> anyhow::Result<SessionPlan> {
    let store = build_store(settings);
    let index = ContentIndex::new(store);
    let oracle: Arc<dyn PlanningOracle> = Arc::new(ChatOracle::new(
        settings.oracle.base_url.clone(),
        settings.oracle.api_key.clone(),
        settings.oracle.model.clone(),
    ));
    let planner = SessionPlanner::new(index, oracle);
    let plan = planner
        .plan(&args.concept, args.duration, args.exclude_days, !args.no_reuse)
        .await?;
    Ok(plan)
}

fn build_store(settings: &Settings) -> Arc<dyn BlobStore> {
    match settings.library.backend {
        StoreBackend::Fs => Arc::new(FsStore::new(settings.library.root.clone())),
        StoreBackend::Http => Arc::new(HttpStore::new(
            settings.library.base_url.clone(),
            settings.library.api_token.clone(),
        )),
    }
}

fn build_acquirer(settings: &Settings, store: Arc<dyn BlobStore>) -> TrackAcquirer {
    TrackAcquirer::new(
        store,
        Arc::new(ElevenLabsProvider::new(
            settings.providers.elevenlabs_base_url.clone(),
            settings.providers.elevenlabs_api_key.clone(),
        )),
        Arc::new(StableAudioProvider::new(
            settings.providers.stability_base_url.clone(),
            settings.providers.stability_api_key.clone(),
            settings.providers.stable_audio_model.clone(),
        )),
    )
}

fn print_plan(plan: &SessionPlan) {
    println!("Session plan: \"{}\"", plan.concept);
    println!(
        "  Genre: {}  BPM: {:.0}-{:.0}  Model: {}",
        plan.genre, plan.bpm_range.0, plan.bpm_range.1, plan.model_used
    );
    for slot in &plan.slots {
        let source = match slot.source {
            longplay_common::model::SlotSource::Library => "library ",
            longplay_common::model::SlotSource::Generate => "generate",
        };
        println!(
            "  {:>2}. [{:<8}] {}  {}  {:.0} BPM  energy {}  {}",
            slot.order,
            slot.role,
            source,
            format_timestamp(slot.target_duration_ms()),
            slot.bpm_target,
            slot.energy,
            slot.title,
        );
    }
    println!(
        "  Planned: {:.1} min of a {} min target  Estimated cost: ${:.2}",
        plan.planned_duration_ms() as f64 / 60_000.0,
        plan.target_duration_minutes,
        plan.estimated_cost_usd,
    );
}

fn print_tracklist(entries: &[crate::mix::TracklistEntry]) {
    println!("  Tracklist:");
    for entry in entries {
        println!("    {} - {}", format_timestamp(entry.start_ms), entry.title);
    }
}
