//! Charts drawn from the bench's time-series CSV.

use anyhow::Result;
use labforge_core::analysis::read_log;
use labforge_core::simulation::state::LabEvent;
use plotters::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// The per-container slice of `containers_json` the charts need.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerSample {
    total_volume: f64,
    temperature: f64,
    #[serde(default)]
    volume_remaining: Option<f64>,
}

/// A flattened structure to hold all the parsed data from a single log record for easy plotting.
#[derive(Debug)]
struct PlottingData {
    tick: u64,
    volumes: BTreeMap<String, f64>,
    temperatures: BTreeMap<String, f64>,
    bottle_levels: BTreeMap<String, f64>,
    max_temperature: f64,
    events: Vec<LabEvent>,
}

/// The main function to generate and save all plots for a run.
pub fn generate_all_plots(output_dir: &str, log_path: &str) -> Result<()> {
    println!("[Plotting] Generating graphs from lab data...");

    let data = parse_log_file(log_path)?;

    if data.is_empty() {
        println!("[Plotting] Warning: No data to plot.");
        return Ok(());
    }

    plot_container_volumes(output_dir, &data)?;
    plot_temperatures(output_dir, &data)?;
    plot_bottle_levels(output_dir, &data)?;
    plot_event_timeline(output_dir, &data)?;

    println!("[Plotting] Graphs have been saved to '{}'.", output_dir);
    Ok(())
}

fn parse_log_file(log_path: &str) -> Result<Vec<PlottingData>> {
    let mut data = Vec::new();

    for record in read_log(log_path)? {
        let containers: BTreeMap<String, ContainerSample> =
            serde_json::from_str(&record.containers_json)?;
        let events: Vec<LabEvent> = serde_json::from_str(&record.events_json)?;

        let mut volumes = BTreeMap::new();
        let mut temperatures = BTreeMap::new();
        let mut bottle_levels = BTreeMap::new();
        for (id, sample) in containers {
            match sample.volume_remaining {
                Some(level) => {
                    bottle_levels.insert(id, level);
                }
                None => {
                    volumes.insert(id.clone(), sample.total_volume);
                    temperatures.insert(id, sample.temperature);
                }
            }
        }

        data.push(PlottingData {
            tick: record.tick,
            volumes,
            temperatures,
            bottle_levels,
            max_temperature: record.max_temperature_c,
            events,
        });
    }

    Ok(data)
}

fn series_ids(data: &[PlottingData], pick: impl Fn(&PlottingData) -> &BTreeMap<String, f64>) -> Vec<String> {
    data.iter()
        .flat_map(|d| pick(d).keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One line per container. Rows where the container is absent are skipped.
fn draw_lines(
    path: &str,
    caption: &str,
    y_desc: &str,
    data: &[PlottingData],
    pick: impl Fn(&PlottingData) -> &BTreeMap<String, f64>,
) -> Result<()> {
    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_tick = data.last().map_or(1, |d| d.tick).max(1);
    let max_value = data
        .iter()
        .flat_map(|d| pick(d).values().copied())
        .fold(0.0, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 50).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0u64..max_tick, 0f64..max_value * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc(y_desc)
        .draw()?;

    let colors = [RED, GREEN, BLUE, YELLOW, CYAN, MAGENTA];
    for (i, id) in series_ids(data, &pick).iter().enumerate() {
        let color = colors[i % colors.len()];
        chart
            .draw_series(LineSeries::new(
                data.iter()
                    .filter_map(|d| pick(d).get(id).map(|v| (d.tick, *v))),
                color.stroke_width(2),
            ))?
            .label(id.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn plot_container_volumes(output_dir: &str, data: &[PlottingData]) -> Result<()> {
    let path = format!("{}/1_container_volumes.png", output_dir);
    draw_lines(&path, "Container Volumes Over Time", "Volume (mL)", data, |d| &d.volumes)
}

fn plot_bottle_levels(output_dir: &str, data: &[PlottingData]) -> Result<()> {
    let path = format!("{}/3_bottle_levels.png", output_dir);
    draw_lines(&path, "Bottle Levels Over Time", "Remaining (mL)", data, |d| &d.bottle_levels)
}

/// Per-container temperatures plus the bench maximum as a dashed line.
fn plot_temperatures(output_dir: &str, data: &[PlottingData]) -> Result<()> {
    let path = format!("{}/2_temperatures.png", output_dir);
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_tick = data.last().map_or(1, |d| d.tick).max(1);
    let max_temperature = data
        .iter()
        .map(|d| d.max_temperature)
        .fold(0.0, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption("Temperature Over Time", ("sans-serif", 50).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0u64..max_tick, 0f64..max_temperature * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Temperature (°C)")
        .draw()?;

    let colors = [RED, GREEN, BLUE, YELLOW, CYAN, MAGENTA];
    for (i, id) in series_ids(data, |d| &d.temperatures).iter().enumerate() {
        let color = colors[i % colors.len()];
        chart
            .draw_series(LineSeries::new(
                data.iter()
                    .filter_map(|d| d.temperatures.get(id).map(|t| (d.tick, *t))),
                color.stroke_width(2),
            ))?
            .label(id.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.filled()));
    }

    chart
        .draw_series(DashedLineSeries::new(
            data.iter().map(|d| (d.tick, d.max_temperature)),
            5,
            5,
            (&BLACK).into(),
        ))?
        .label("Bench maximum")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Marks the ticks that saw a pour or a reaction.
fn plot_event_timeline(output_dir: &str, data: &[PlottingData]) -> Result<()> {
    let path = format!("{}/4_event_timeline.png", output_dir);
    let root = BitMapBackend::new(&path, (1024, 256)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_tick = data.last().map_or(1, |d| d.tick).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Pours and Reactions", ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(20)
        .build_cartesian_2d(0u64..max_tick, 0..3i32)?;

    chart.configure_mesh()
        .x_desc("Time (s)")
        .disable_y_axis()
        .draw()?;

    let ticks_with = |wanted: fn(&LabEvent) -> bool| -> Vec<u64> {
        data.iter()
            .filter(|d| d.events.iter().any(wanted))
            .map(|d| d.tick)
            .collect()
    };
    let pours = ticks_with(|e| matches!(e, LabEvent::Poured { .. }));
    let reactions = ticks_with(|e| matches!(e, LabEvent::ReactionApplied { .. }));

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .data(pours.iter().map(|tick| (*tick, 1))),
    )?;
    chart.draw_series(
        Histogram::vertical(&chart)
            .style(RED.filled())
            .data(reactions.iter().map(|tick| (*tick, 2))),
    )?;

    root.present()?;
    Ok(())
}
