use session_annotator::grouping::{groups_from_positions, groups_from_shanks, load_channel_positions};
use session_annotator::{ProbeGeometry, SessionPaths, SortingSettings};
use std::env;
use std::path::Path;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <recording.bin.ap | channel_positions.npy>", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let groups = if path.extension().map_or(false, |ext| ext == "npy") {
        match load_channel_positions(path)
            .and_then(|positions| groups_from_positions(&positions, 50.0, 50.0))
        {
            Ok(groups) => groups,
            Err(e) => {
                eprintln!("Error loading positions: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let session = SessionPaths::from_recording(path);
        println!("Session: {}", session.base_name);
        println!("Probe file: {}", session.probe_path().display());

        let settings = SortingSettings::for_session(&session);
        println!("Sorter channels: {}", settings.n_chan_bin);

        match ProbeGeometry::load(session.probe_path()) {
            Ok(probe) => groups_from_shanks(&probe),
            Err(e) => {
                eprintln!("Error loading probe: {}", e);
                std::process::exit(1);
            }
        }
    };

    println!("\n{} channel groups:", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!("  Group {}: {} channels {:?}", i, group.len(), group.channels);
    }
}
