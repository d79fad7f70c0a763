use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use narrative_tree::outline::render_outline;
use narrative_tree::search::{SearchHit, find_nodes};
use narrative_tree::session::{NewNodeRequest, SessionSnapshot};
use narrative_tree::story::load_story;
use narrative_tree::{ChoiceStep, LayoutConfig, ReaderSession, Story};

const SEARCH_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Outline,
    Transcript,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Story document to read; `-` reads stdin.
    #[arg(default_value = "-")]
    story: PathBuf,
    /// Move the active path to this node before choosing.
    #[arg(long)]
    jump: Option<String>,
    /// Move the active path to the best match for this text.
    #[arg(long)]
    find: Option<String>,
    /// Option index to take at the current node; repeatable.
    #[arg(long = "choose", value_name = "INDEX")]
    choices: Vec<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    #[arg(long)]
    pretty: bool,
    #[arg(short, long)]
    verbose: bool,
    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Debug, clap::Args)]
struct LayoutArgs {
    #[arg(long)]
    level_height: Option<f32>,
    #[arg(long)]
    node_width: Option<f32>,
    #[arg(long)]
    sibling_gap: Option<f32>,
    #[arg(long)]
    subtree_gap: Option<f32>,
    #[arg(long)]
    global_iterations: Option<usize>,
    #[arg(long)]
    level_iterations: Option<usize>,
    #[arg(long)]
    recenter_damping: Option<f32>,
}

impl LayoutArgs {
    fn apply(&self, mut config: LayoutConfig) -> LayoutConfig {
        if let Some(value) = self.level_height {
            config.level_height = value;
        }
        if let Some(value) = self.node_width {
            config.node_width = value;
        }
        if let Some(value) = self.sibling_gap {
            config.sibling_gap = value;
        }
        if let Some(value) = self.subtree_gap {
            config.subtree_gap = value;
        }
        if let Some(value) = self.global_iterations {
            config.global_iterations = value;
        }
        if let Some(value) = self.level_iterations {
            config.level_iterations = value;
        }
        if let Some(value) = self.recenter_damping {
            config.recenter_damping = value;
        }
        config
    }
}

/// Command-line overrides win over the document's `layout` block, which wins
/// over the defaults.
fn layout_config(story: &mut Story, overrides: &LayoutArgs) -> LayoutConfig {
    overrides.apply(story.layout.take().unwrap_or_default())
}

/// Takes each option in turn. Stops at the first one that needs a new node
/// and returns its request.
fn follow_choices(
    session: &mut ReaderSession,
    choices: &[usize],
) -> Result<Option<NewNodeRequest>> {
    for &index in choices {
        match session.choose(index) {
            ChoiceStep::Reused { id, matched } => {
                debug!(index, node = %id, ?matched, "followed existing branch");
            }
            ChoiceStep::NeedsNode(request) => return Ok(Some(request)),
            ChoiceStep::Unavailable => {
                let current = session.path().current().unwrap_or("<none>");
                bail!("option {index} is not available at node `{current}`");
            }
        }
    }
    Ok(None)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    pending_choice: Option<NewNodeRequest>,
    search_hits: Vec<SearchHit>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut story = load_story(&args.story)?;
    let config = layout_config(&mut story, &args.layout);
    let mut session = ReaderSession::new(story, config);

    if let Some(target) = &args.jump
        && !session.jump_to(target)
    {
        bail!("no story node with id `{target}`");
    }

    let mut search_hits = Vec::new();
    if let Some(query) = &args.find {
        search_hits = find_nodes(session.nodes(), query, SEARCH_LIMIT);
        let Some(best) = search_hits.first() else {
            bail!("no story node matches `{query}`");
        };
        debug!(query = %query, hit = %best.id, score = best.score, "jumping to search hit");
        let target = best.id.clone();
        session.jump_to(&target);
    }

    let pending_choice = follow_choices(&mut session, &args.choices)?;

    let output = match args.format {
        OutputFormat::Outline => render_outline(session.tree(), session.nodes(), session.path()),
        OutputFormat::Transcript => session.transcript(),
        OutputFormat::Json => {
            let report = Report {
                snapshot: session.snapshot(),
                pending_choice,
                search_hits,
            };
            let json = if args.pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            };
            json.context("failed to serialize story report")?
        }
    };

    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
