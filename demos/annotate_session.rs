use session_annotator::{annotate_file, AnnotationRequest, ChannelGroup, StepOutcome};
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <template.xml> <output.xml>", args[0]);
        std::process::exit(1);
    }

    // Five shanks of 8 channels; the first three in CA1, the last two in PFC
    let groups: Vec<ChannelGroup> = (0..5)
        .map(|shank| ChannelGroup::new(shank * 8..(shank + 1) * 8))
        .collect();
    let request = AnnotationRequest::new(groups)
        .with_date("2025-11-17")
        .with_region_labels(["CA1", "CA1", "CA1", "PFC", "PFC"]);

    let report = annotate_file(&args[1], &args[2], &request)?;

    println!("Groups written: {}", report.group_count);
    println!("Channels written: {}", report.channel_count);
    for (name, entry) in report.regions.iter() {
        println!(
            "  {}: {} channels, electrode groups {:?}",
            name,
            entry.channels.len(),
            entry.electrode_groups
        );
    }

    for (step, outcome) in [
        ("date", &report.date),
        ("region", &report.region_array),
        ("brainRegions", &report.brain_regions),
    ] {
        match outcome {
            StepOutcome::Applied => println!("  {}: applied", step),
            StepOutcome::Skipped(reason) => println!("  {}: skipped ({})", step, reason),
        }
    }

    Ok(())
}
