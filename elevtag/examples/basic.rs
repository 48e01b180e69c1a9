//! Basic example: profile a few hiking routes.
//!
//! Run with: cargo run --example basic -- /path/to/data/dir
//!
//! Without a `sources.json` in the data directory, SRTM tiles are
//! downloaded on demand.

use elevtag::{ElevationError, Line, MultiLine, Session, SessionConfig};
use std::env;

fn main() -> Result<(), ElevationError> {
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/data/dir");
        std::process::exit(1);
    });

    // Around Mount Fuji's Yoshida trail
    let routes = [
        ("Trail start to 5th station", vec![(138.7758, 35.4178), (138.7552, 35.3907), (138.7345, 35.3951)]),
        ("5th station to summit", vec![(138.7345, 35.3951), (138.7317, 35.3740), (138.7274, 35.3606)]),
        ("Summit", vec![(138.7274, 35.3606)]),
    ];

    let lines: MultiLine = routes
        .iter()
        .map(|(_, pts)| Line::from_xy(pts))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .collect();

    let config = SessionConfig::builder(&data_dir).build()?;
    let mut session = Session::open(config)?;
    let stats = session.tag(&lines)?;

    println!("{:<28} {:>8} {:>8} {:>8} {:>8}", "route", "start", "end", "climb", "descent");
    println!("{:-<64}", "");
    for ((name, _), s) in routes.iter().zip(&stats) {
        match s.to_record() {
            Some([start, end, climb, descent]) => println!(
                "{:<28} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
                name, start, end, climb, descent
            ),
            None => println!("{:<28} (no elevation data)", name),
        }
    }

    Ok(())
}
