use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use session_annotator::config::{GroupsConfig, JobConfig};
use session_annotator::grouping::groups_from_shanks;
use session_annotator::{annotate_file, ProbeGeometry, SessionPaths, SortingSettings};

#[derive(Parser, Debug)]
#[command(name = "session-annotator")]
#[command(about = "Annotate NeuroScope session files with channel groups and brain regions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an annotated copy of a session template
    Annotate(AnnotateArgs),
    /// Print the shank groups of a probe channel-map file
    ProbeGroups {
        /// Probe channel-map JSON
        probe: PathBuf,
    },
    /// Show the file names derived from a recording and write sorter settings
    Session {
        /// Raw recording (e.g. 2024-06-10_15-45-00.bin.ap)
        recording: PathBuf,

        /// Write sorter settings JSON here
        #[arg(long)]
        settings_out: Option<PathBuf>,

        /// Channels interleaved in the binary file
        #[arg(long)]
        n_chan_bin: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// TOML job file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template session-description file
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output path for the annotated file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Recording date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Region label per group (comma-separated, empty for unassigned)
    #[arg(long, value_delimiter = ',')]
    regions: Option<Vec<String>>,

    /// Channel groups, e.g. "0,1,2;3,4,5"
    #[arg(long)]
    groups: Option<String>,

    /// Take groups from the shanks of a probe channel-map file
    #[arg(long)]
    probe: Option<PathBuf>,

    /// Take groups from clustering channel_positions.npy
    #[arg(long)]
    positions: Option<PathBuf>,

    /// Horizontal linking distance for --positions (um)
    #[arg(long)]
    x_threshold: Option<f32>,

    /// Vertical linking distance for --positions (um)
    #[arg(long)]
    y_threshold: Option<f32>,

    /// Emit brain regions sorted by name
    #[arg(long)]
    sort_regions: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Annotate(args) => run_annotate(args),
        Command::ProbeGroups { probe } => {
            let probe = ProbeGeometry::load(&probe)
                .with_context(|| format!("loading probe {}", probe.display()))?;
            for (idx, group) in groups_from_shanks(&probe).iter().enumerate() {
                println!("Group {}: {:?}", idx, group.channels);
            }
            Ok(())
        }
        Command::Session {
            recording,
            settings_out,
            n_chan_bin,
        } => {
            let session = SessionPaths::from_recording(&recording);
            println!("Session: {}", session.base_name);
            println!("Probe file: {}", session.probe_path().display());
            println!("Session XML: {}", session.session_xml_path().display());

            if let Some(out) = settings_out {
                let mut settings = SortingSettings::for_session(&session);
                if let Some(n) = n_chan_bin {
                    settings.n_chan_bin = n;
                }
                settings
                    .save(&out)
                    .with_context(|| format!("writing {}", out.display()))?;
                info!("Wrote sorter settings to {}", out.display());
            }
            Ok(())
        }
    }
}

fn run_annotate(args: AnnotateArgs) -> Result<()> {
    let mut job = match &args.config {
        Some(path) => JobConfig::load(path)
            .with_context(|| format!("loading job file {}", path.display()))?,
        None => {
            let (template, output) = match (&args.template, &args.output) {
                (Some(t), Some(o)) => (t.clone(), o.clone()),
                _ => bail!("--template and --output are required without --config"),
            };
            JobConfig {
                template,
                output,
                date: None,
                regions: None,
                sort_regions: false,
                groups: GroupsConfig::default(),
            }
        }
    };

    if let Some(template) = args.template {
        job.template = template;
    }
    if let Some(output) = args.output {
        job.output = output;
    }
    if args.date.is_some() {
        job.date = args.date;
    }
    if args.regions.is_some() {
        job.regions = args.regions;
    }
    if args.sort_regions {
        job.sort_regions = true;
    }
    if args.groups.is_some() || args.probe.is_some() || args.positions.is_some() {
        job.groups.inline = args.groups.as_deref().map(parse_groups).transpose()?;
        job.groups.probe = args.probe;
        job.groups.positions = args.positions;
    }
    if let Some(x) = args.x_threshold {
        job.groups.x_threshold = x;
    }
    if let Some(y) = args.y_threshold {
        job.groups.y_threshold = y;
    }

    let request = job.to_request()?;
    let report = annotate_file(&job.template, &job.output, &request)
        .with_context(|| format!("annotating {}", job.template.display()))?;

    info!(
        "Annotated {} groups ({} channels) across {} regions",
        report.group_count,
        report.channel_count,
        report.regions.len()
    );
    Ok(())
}

/// Parses "0,1,2;3,4" into two groups.
fn parse_groups(list: &str) -> Result<Vec<Vec<usize>>> {
    list.split(';')
        .filter(|group| !group.trim().is_empty())
        .map(|group| {
            group
                .split(',')
                .map(|ch| {
                    ch.trim()
                        .parse::<usize>()
                        .with_context(|| format!("bad channel index {:?}", ch))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_annotator::ChannelGroup;

    #[test]
    fn parses_group_lists() {
        assert_eq!(parse_groups("0,1,2;3, 4").unwrap(), vec![vec![0, 1, 2], vec![3, 4]]);
        assert_eq!(parse_groups("").unwrap(), Vec::<Vec<usize>>::new());
        assert!(parse_groups("0,x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parsed_groups_become_channel_groups() {
        let groups: Vec<ChannelGroup> = parse_groups("5,6;7")
            .unwrap()
            .into_iter()
            .map(ChannelGroup::from)
            .collect();
        assert_eq!(groups[1].channels, vec![7]);
    }
}
