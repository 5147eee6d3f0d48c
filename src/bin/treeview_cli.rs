use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::{env, fs, sync::Arc};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use treeview::{
    NavigationEngine, NodeId, TrackGraph, about,
    actions::Action,
    selection::Modifiers,
    settings::ViewSettings,
    tracks_from_table::tracks_from_csv_path,
    tree_export::export_tree_svg,
};

#[derive(Serialize)]
struct GraphSummary {
    nodes: usize,
    edges: usize,
    ndim: Option<usize>,
    roots: usize,
    trees: usize,
    tracks: usize,
    divisions: usize,
}

#[derive(Serialize)]
struct StepReport {
    action: Action,
    moved: bool,
    node: Option<NodeId>,
    highlight: Vec<[f64; 2]>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  treeview_cli --version\n  \
  treeview_cli [--settings PATH] summary TRACKS.csv\n  \
  treeview_cli [--settings PATH] layout TRACKS.csv\n  \
  treeview_cli [--settings PATH] render-svg TRACKS.csv OUTPUT.svg [NODE_ID]\n  \
  treeview_cli [--settings PATH] navigate TRACKS.csv NODE_ID ACTION...\n\n  \
  Actions: select-next-cell, select-prev-cell, select-next-lineage,\n  \
  select-prev-lineage, select-next-feature, select-prev-feature,\n  \
  toggle-mode, toggle-feature, flip-orientation, or an arrow (left|right|up|down)\n  \
  Log level: RUST_LOG=debug"
    );
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn parse_global_settings_arg(args: &[String]) -> Result<(ViewSettings, usize)> {
    if args.len() >= 3 && args[1] == "--settings" {
        let settings = ViewSettings::load_from_path(&args[2])?;
        return Ok((settings, 3));
    }
    Ok((ViewSettings::default(), 1))
}

fn parse_node_id(text: &str) -> Result<NodeId> {
    text.parse::<NodeId>()
        .with_context(|| format!("'{text}' is not a node id"))
}

fn load_engine(path: &str, settings: ViewSettings) -> Result<NavigationEngine> {
    let graph: TrackGraph =
        tracks_from_csv_path(path).with_context(|| format!("Could not load tracks from '{path}'"))?;
    Ok(NavigationEngine::new(Arc::new(graph), settings)?)
}

fn summarize(engine: &NavigationEngine) -> GraphSummary {
    let forest = engine.forest();
    GraphSummary {
        nodes: engine.graph().len(),
        edges: engine.graph().edges().len(),
        ndim: engine.graph().ndim(),
        roots: engine.graph().roots().len(),
        trees: forest.trees.len(),
        tracks: forest.track_count(),
        divisions: forest
            .trees
            .iter()
            .flat_map(|t| &t.tracks)
            .filter(|t| t.ends_in_division())
            .count(),
    }
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (settings, cmd_idx) = parse_global_settings_arg(&args)?;
    if args.len() <= cmd_idx + 1 {
        usage();
        bail!("Missing command or tracks table");
    }
    let command = &args[cmd_idx];
    let tracks_path = &args[cmd_idx + 1];

    match command.as_str() {
        "summary" => {
            let engine = load_engine(tracks_path, settings)?;
            print_json(&summarize(&engine))
        }
        "layout" => {
            let engine = load_engine(tracks_path, settings)?;
            print_json(engine.layout())
        }
        "render-svg" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                bail!("render-svg requires: TRACKS.csv OUTPUT.svg [NODE_ID]");
            }
            let output = &args[cmd_idx + 2];
            let mut engine = load_engine(tracks_path, settings)?;
            if let Some(node) = args.get(cmd_idx + 3) {
                engine.select_node(parse_node_id(node)?, Modifiers::default())?;
            }
            let svg = export_tree_svg(
                engine.layout(),
                engine.settings().orientation,
                engine.highlight(),
            );
            fs::write(output, svg)
                .with_context(|| format!("Could not write SVG output '{output}'"))?;
            println!(
                "Wrote lineage tree with {} lane(s) to '{output}'",
                engine.layout().lane_count()
            );
            Ok(())
        }
        "navigate" => {
            if args.len() <= cmd_idx + 2 {
                usage();
                bail!("navigate requires: TRACKS.csv NODE_ID ACTION...");
            }
            let mut engine = load_engine(tracks_path, settings)?;
            engine.select_node(parse_node_id(&args[cmd_idx + 2])?, Modifiers::default())?;
            let mut steps = vec![];
            for name in &args[cmd_idx + 3..] {
                // Arrow keys resolve against the orientation at the time of the step.
                let action = Action::parse(name, engine.settings().orientation)
                    .ok_or_else(|| anyhow!("Unknown action '{name}'"))?;
                let moved = engine.apply(action)?;
                steps.push(StepReport {
                    action,
                    moved,
                    node: engine.current_node(),
                    highlight: engine.highlight().to_vec(),
                });
            }
            print_json(&steps)
        }
        _ => {
            usage();
            Err(anyhow!("Unknown command '{command}'"))
        }
    }
}
