use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hearth_core::Request;

/// Hearth: front controller for a hearth application root
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Application root holding `core/`, `modules/` and `sites/`
    #[arg(long, global = true, default_value = ".")]
    pub app_root: PathBuf,

    /// Kernel environment; selects the compiled container artifact
    #[arg(long, global = true, default_value = "prod")]
    pub env: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one request through the kernel and print the response
    Serve(RequestArgs),
    /// Print the site directory a request resolves to
    SitePath(RequestArgs),
    /// Drop the compiled container and build a fresh one
    Rebuild {
        /// Site directory, relative to the application root
        #[arg(long, default_value = "sites/default")]
        site: PathBuf,
    },
}

/// The inbound request, as a web server would describe it
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Request URI including the query string
    #[arg(default_value = "/")]
    pub uri: String,

    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Path of the front controller script
    #[arg(long, default_value = "/index.php")]
    pub script_name: String,

    #[arg(long)]
    pub https: bool,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Cookie as `name=value`; may be repeated
    #[arg(long = "cookie", value_parser = parse_cookie)]
    pub cookies: Vec<(String, String)>,
}

impl RequestArgs {
    pub fn to_request(&self) -> Request {
        let mut request = Request::new(self.method.to_uppercase(), self.uri.clone())
            .with_host(self.host.clone())
            .with_script_name(self.script_name.clone())
            .with_https(self.https);
        if let Some(user_agent) = &self.user_agent {
            request = request.with_user_agent(user_agent.clone());
        }
        for (name, value) in &self.cookies {
            request = request.with_cookie(name.clone(), value.clone());
        }
        request
    }
}

fn parse_cookie(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}
