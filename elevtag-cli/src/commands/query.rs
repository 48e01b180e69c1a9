use anyhow::{Context, Result};
use elevtag::{Line, MultiLine};
use serde::Serialize;

use super::Settings;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: Option<f64>,
    source: String,
}

pub fn run(settings: &Settings, lat: f64, lon: f64, json: bool) -> Result<()> {
    let mut session = settings.session()?;
    let lines: MultiLine = std::iter::once(Line::from_xy(&[(lon, lat)])?).collect();

    let source = session.catalog().select(&lines.bbox()).name;
    let stats = session
        .tag(&lines)
        .context("Failed to get elevation")?;
    let elevation = stats
        .first()
        .and_then(|s| s.to_record())
        .map(|[start, ..]| start);

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation,
            source,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(e) => println!("{}", e),
            None => println!("void"),
        }
    }

    Ok(())
}
