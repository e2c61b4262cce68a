mod cli;
mod front;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hearth_core::kernel::{constants, rebuild};
use hearth_core::{BootContext, BootStatus, Kernel, KernelError, KernelOptions, PageCacheOutcome, Request, Response};
use log::{error, info};

use crate::cli::{CliArgs, Commands, RequestArgs};
use crate::front::{SiteKernel, failure_response};

fn options(env: &str) -> KernelOptions {
    KernelOptions::new(env, Arc::new(SiteKernel))
}

fn print_response(request: &Request, response: &Response) {
    print!("{}", response.to_http_string(request.server_protocol()));
}

/// Page cache first, then full dispatch and terminate
async fn run_request(kernel: &mut Kernel, request: &Request) -> Result<Response, KernelError> {
    if let PageCacheOutcome::Hit(response) = kernel.handle_page_cache(request)? {
        return Ok(response);
    }
    let response = kernel.handle(request).await?;
    kernel.terminate(request, &response).await?;
    Ok(response)
}

async fn serve(args: &CliArgs, request_args: &RequestArgs) -> ExitCode {
    let request = request_args.to_request();
    let context = BootContext::new(&args.app_root);

    let mut kernel = match Kernel::from_request(context, &request, options(&args.env)) {
        Ok(kernel) => kernel,
        Err(KernelError::InvalidHost { host }) => {
            info!("Rejected request with invalid host '{}'", host);
            print_response(&request, &Response::bad_request("Bad request"));
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("Kernel could not be created: {}", e);
            print_response(&request, &failure_response(None, ""));
            return ExitCode::FAILURE;
        }
    };

    let result = if request.path() == constants::REBUILD_PATH {
        kernel.handle_rebuild(&request, rebuild::unix_now())
    } else {
        run_request(&mut kernel, &request).await
    };
    match result {
        Ok(response) => {
            print_response(&request, &response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Unhandled error while serving {}: {}", request.uri(), e);
            let base_url = kernel.base_url(&request).unwrap_or_default();
            print_response(&request, &failure_response(Some(kernel.settings()), &base_url));
            ExitCode::FAILURE
        }
    }
}

fn site_path(args: &CliArgs, request_args: &RequestArgs) -> ExitCode {
    let request = request_args.to_request();
    let context = BootContext::new(&args.app_root);
    match context.site_path(&request, true) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error resolving site path: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn rebuild(args: &CliArgs, site: &std::path::Path) -> ExitCode {
    let context = BootContext::new(&args.app_root);
    let result = Kernel::for_site(context, site, options(&args.env)).and_then(|mut kernel| {
        let container = kernel.rebuild_container()?;
        if let BootStatus::InstallRequired(_) = kernel.boot()? {
            info!("Site {} is not installed yet", site.display());
        }
        Ok(container.service_ids().count())
    });
    match result {
        Ok(services) => {
            println!("Rebuilt service container for {} ({} services)", site.display(), services);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error rebuilding service container: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = env_logger::try_init() {
        eprintln!("Failed to initialize env_logger: {}", e);
    }

    let args = CliArgs::parse();
    match &args.command {
        Commands::Serve(request_args) => serve(&args, request_args).await,
        Commands::SitePath(request_args) => site_path(&args, request_args),
        Commands::Rebuild { site } => rebuild(&args, site),
    }
}
