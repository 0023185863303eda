use anyhow::Result;
use clap::Parser;
use client_core::{load_settings, DoorCaption, FleetClient, FleetEvent};
use shared::domain::Direction;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    /// Backend base URL; overrides client.toml and environment.
    #[arg(long)]
    api_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_base_url) = args.api_base_url {
        settings.api_base_url = api_base_url;
    }

    let client = FleetClient::new(settings);
    let mut events = client.subscribe_events();
    client.connect().await?;
    println!("Connected. Commands: call <column> <floor> <up|down>, status, quit");

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                FleetEvent::ConnectionChanged(state) => {
                    println!("connection: {}", state.describe());
                }
                FleetEvent::CallPending {
                    column,
                    floor,
                    direction,
                } => println!("pending: column {column} floor {floor} {direction}"),
                FleetEvent::CallCleared {
                    column,
                    floor,
                    direction,
                    reason,
                } => println!("cleared: column {column} floor {floor} {direction} ({reason:?})"),
                FleetEvent::SnapshotApplied { .. } => {}
                FleetEvent::Error(message) => println!("error: {message}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["quit"] | ["exit"] => break,
            ["status"] => print_status(&client).await,
            ["call", column, floor, direction] => {
                let parsed = parse_call(column, floor, direction);
                match parsed {
                    Some((column, floor, direction)) => {
                        if let Err(err) = client.request_call(column, floor, direction).await {
                            warn!(%err, "call rejected");
                            println!("rejected: {err}");
                        }
                    }
                    None => println!("usage: call <column> <floor> <up|down>"),
                }
            }
            [] => {}
            _ => println!("commands: call <column> <floor> <up|down>, status, quit"),
        }
    }

    client.shutdown().await;
    printer.abort();
    Ok(())
}

fn parse_call(column: &str, floor: &str, direction: &str) -> Option<(usize, i64, Direction)> {
    let column = column.parse().ok()?;
    let floor = floor.parse().ok()?;
    let direction = match direction {
        "up" => Direction::Up,
        "down" => Direction::Down,
        _ => return None,
    };
    Some((column, floor, direction))
}

async fn print_status(client: &FleetClient) {
    let view = client.view().await;
    println!("connection: {}", view.status_line);
    for (column, column_view) in view.columns.iter().enumerate() {
        let car = &column_view.car;
        let door = column_view
            .floors
            .iter()
            .find(|cell| cell.car_here)
            .map(|cell| match cell.door {
                DoorCaption::Open => "open",
                DoorCaption::Closed => "closed",
            })
            .unwrap_or("closed");
        println!(
            "column {column}: car {} at floor {} ({}, door {door}, targets {:?})",
            car.id.0, car.current_floor, car.direction, car.targets
        );
    }
}
