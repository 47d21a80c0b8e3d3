use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use dewey::{OutputFormat, RequestParams};

/// Fetch metadata, file listings and files from the Dewey Data API.
#[derive(Parser, Debug)]
#[command(name = "dewey", author, version, about, long_about = None)]
pub struct Args {
    /// Product to fetch data for.
    pub product: String,

    /// API key (defaults to DEWEY_API_KEY, then the `.deweyrc` file).
    #[arg(short, long)]
    pub key: Option<String>,

    /// Products endpoint of the API (defaults to DEWEY_API_URL, then the
    /// `.deweyrc` file, then the public endpoint).
    #[arg(long)]
    pub url: Option<String>,

    /// Additional listing parameters as a JSON object,
    /// e.g. '{"partition_key_after": "2023-01-01"}'.
    #[arg(long, value_parser = parse_params)]
    pub params: Option<RequestParams>,

    /// Delay in seconds before every request.
    #[arg(long, value_name = "SECONDS", default_value = "0", value_parser = parse_seconds)]
    pub sleep: Duration,

    /// Request timeout in seconds (unbounded when omitted).
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch metadata for the product.
    Meta,

    /// List files for the product.
    List(OutputArgs),

    /// Download files for the product.
    Download {
        /// Directory to save files to.
        dirpath: PathBuf,

        /// Do not create one subdirectory per partition key.
        #[arg(short = 'n', long)]
        no_partition: bool,

        /// Never draw progress bars.
        #[arg(long)]
        no_progress: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(ClapArgs, Debug)]
pub struct OutputArgs {
    /// Listing format written to stdout: jsonl, tsv or csv.
    #[arg(short, long, default_value = "jsonl")]
    pub format: String,

    /// Field separator for delimited formats (overrides the format's default).
    #[arg(short, long, value_name = "CHAR")]
    pub sep: Option<char>,
}

impl OutputArgs {
    pub fn output_format(&self) -> anyhow::Result<OutputFormat> {
        let format: OutputFormat = self.format.parse()?;
        match self.sep {
            None => Ok(format),
            Some(sep) => {
                let sep = u8::try_from(sep)
                    .map_err(|_| anyhow::anyhow!("separator {sep:?} is not a single byte"))?;
                Ok(OutputFormat::Delimited(sep))
            }
        }
    }
}

fn parse_params(s: &str) -> Result<RequestParams, String> {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid number of seconds: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid number of seconds: {e}"))
}
