use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Session client demo tooling")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Overrides `log.filter` from the settings file.
    #[arg(long)]
    pub log_filter: Option<String>,
}
