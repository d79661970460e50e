use clap::{Args, Parser, Subcommand};
use monasca_query::{MonascaConfig, MonascaDatasource, QueryOptions, TargetSpec, TimeRange};

#[derive(Parser)]
#[command(name = "monasca-cli", version, about = "Query a Monasca metrics API")]
struct Opts {
    #[clap(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every metric name
    Names,
    /// Dimension keys and values for one metric
    Dimensions { metric: String },
    /// Distinct values of a dimension key across all metrics
    Find { key: String },
    /// Run one target and print the resulting series
    Query(QueryArgs),
}

#[derive(Args)]
struct QueryArgs {
    metric: String,

    #[arg(long, default_value = "avg")]
    aggregator: String,

    #[arg(long, default_value = "300")]
    period: String,

    #[arg(long, default_value = "now-6h")]
    from: String,

    #[arg(long, default_value = "now")]
    to: String,

    #[arg(long)]
    alias: Option<String>,

    #[arg(long = "dim", value_parser = parse_dimension, help = "Dimension filter as key=value")]
    dimensions: Vec<(String, String)>,

    #[arg(long)]
    group: bool,
}

impl QueryArgs {
    fn into_options(self) -> QueryOptions {
        let mut target = TargetSpec::new(&self.metric)
            .with_aggregator(self.aggregator.as_str())
            .with_period(&self.period);
        for (key, value) in &self.dimensions {
            target = target.with_dimension(key, value);
        }
        if let Some(alias) = &self.alias {
            target = target.with_alias(alias);
        }
        if self.group {
            target = target.grouped();
        }

        QueryOptions {
            range: TimeRange {
                from: self.from,
                to: self.to,
            },
            targets: vec![target],
            ..Default::default()
        }
    }
}

fn parse_dimension(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("dimension must be key=value, got {}", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let datasource = MonascaDatasource::new(MonascaConfig::from_env())?;

    match opts.cmd {
        Commands::Names => {
            for name in datasource.names_query().await? {
                println!("{}", name);
            }
        }
        Commands::Dimensions { metric } => {
            let dimensions = datasource.catalog().dimensions(&metric).await?;
            println!("{}", serde_json::to_string_pretty(&dimensions)?);
        }
        Commands::Find { key } => {
            for value in datasource.metric_find_query(&key).await? {
                println!("{}", value);
            }
        }
        Commands::Query(args) => {
            let outcome = datasource.query(&args.into_options()).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.failures.is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opts {
        let mut full = vec!["monasca-cli"];
        full.extend_from_slice(args);
        Opts::parse_from(full)
    }

    #[test]
    fn parse_names() {
        assert!(matches!(parse(&["names"]).cmd, Commands::Names));
    }

    #[test]
    fn parse_find() {
        let Commands::Find { key } = parse(&["find", "hostname"]).cmd else {
            panic!("expected find");
        };
        assert_eq!(key, "hostname");
    }

    #[test]
    fn parse_query_defaults() {
        let Commands::Query(args) = parse(&["query", "cpu.idle_perc"]).cmd else {
            panic!("expected query");
        };
        let options = args.into_options();
        assert_eq!(options.range.from, "now-6h");
        assert_eq!(options.range.to, "now");
        let target = &options.targets[0];
        assert_eq!(target.metric, "cpu.idle_perc");
        assert!(!target.group);
        assert!(target.dimensions.is_empty());
    }

    #[test]
    fn parse_query_flags() {
        let Commands::Query(args) = parse(&[
            "query",
            "cpu.idle_perc",
            "--aggregator",
            "max",
            "--period",
            "1m",
            "--dim",
            "hostname=web1",
            "--dim",
            "service=$all",
            "--alias",
            "@hostname",
            "--group",
        ])
        .cmd
        else {
            panic!("expected query");
        };
        let options = args.into_options();
        let target = &options.targets[0];
        assert_eq!(target.dimensions.len(), 2);
        assert_eq!(target.dimensions[0].key, "hostname");
        assert_eq!(target.dimensions[1].value, "$all");
        assert_eq!(target.alias.as_deref(), Some("@hostname"));
        assert!(target.group);
    }

    #[test]
    fn parse_dimension_rejects_missing_separator() {
        assert!(parse_dimension("hostname").is_err());
        assert!(Opts::try_parse_from(["monasca-cli", "query", "cpu", "--dim", "hostname"]).is_err());
        assert_eq!(
            parse_dimension("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
    }
}
