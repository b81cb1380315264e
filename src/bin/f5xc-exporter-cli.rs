use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "f5xc-exporter-cli")]
#[command(about = "Inspect a running f5xc-exporter", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness and enabled collectors
    Health,
    /// Cached readiness of the tenant API
    Ready,
    /// Intervals, cardinality stats and circuit breaker states
    Status,
    /// Raw Prometheus exposition, optionally filtered by metric name prefix
    Metrics {
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Ready => {
            // 503 still carries the JSON body explaining why
            let res = client.get(format!("{}/ready", base)).send().await?;
            let status = res.status();
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
            if !status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Metrics { filter } => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            let text = res.error_for_status()?.text().await?;
            for line in text.lines() {
                let keep = match &filter {
                    Some(prefix) => metric_name(line).is_some_and(|n| n.starts_with(prefix.as_str())),
                    None => true,
                };
                if keep {
                    println!("{}", line);
                }
            }
        }
    }

    Ok(())
}

/// Metric name of an exposition line, including `# HELP`/`# TYPE` lines.
fn metric_name(line: &str) -> Option<&str> {
    let line = line
        .strip_prefix("# HELP ")
        .or_else(|| line.strip_prefix("# TYPE "))
        .unwrap_or(line);
    line.split(|c: char| c == '{' || c.is_whitespace())
        .next()
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: exporter returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
