//! # Daily Newscast
//!
//! Builds the day's newscast script from live headlines and delivers it.
//!
//! ## Pipeline
//!
//! 1. **Script**: for every configured topic, search today's headline and
//!    have the chat model write a short segment about it
//! 2. **Email**: send the script as an HTML message
//! 3. **CMS**: render a cover image, upload it, and publish the script as a
//!    WordPress post
//!
//! Every stage degrades instead of aborting: a topic without news gets a
//! placeholder, a failed generation gets an error marker, a failed cover
//! upload leaves the post without a featured image, and a failing sink does
//! not stop the other. Only a configuration fault before the script is built
//! ends the run early.
//!
//! ## Usage
//!
//! ```sh
//! daily_newscast --config newscast.yaml --output-dir ./out
//! ```

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod cover;
mod delivery;
mod models;
mod outputs;
mod script;
mod segments;
mod sources;
mod utils;

use api::build_generator;
use cli::Cli;
use config::{AppConfig, load_dotenv};
use cover::{CoverCompositor, CoverRenderer};
use delivery::retry::RetryPolicy;
use delivery::{Dispatcher, SmtpMailer, WordPressPublisher};
use models::SinkKind;
use script::ScriptAssembler;
use sources::GNewsSource;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_newscast starting up");

    // .env first so env-backed flags can see it
    load_dotenv();
    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, args.skip_email, args.skip_cms, "Parsed CLI arguments");

    let config = AppConfig::load(&args)?;
    info!(
        topics = config.topics.len(),
        model = %config.llm.model,
        "Configuration loaded"
    );

    // The only fatal faults: nothing can be written without these.
    let generator = build_generator(&config.llm).inspect_err(|e| {
        error!(error = %e, "Cannot build the text-generation client");
    })?;
    let source = GNewsSource::new(&config.search)?;

    // ---- [1/3] Script ----
    let today = Local::now().date_naive();
    info!(%today, "[1/3] Generating script");
    let assembler = ScriptAssembler::new(source, generator);
    let script = assembler.assemble(&config.topics, today).await;

    let compositor = CoverCompositor::from_config(&config.cover);

    if let Some(dir) = &args.output_dir {
        let cover = compositor
            .render()
            .inspect_err(|e| warn!(error = %e, "Cover rendering failed; writing script only"))
            .ok();
        if let Err(e) = outputs::write_run(&script, cover.as_ref(), dir).await {
            error!(path = %dir.display(), error = %e, "Failed to write local outputs");
        }
    }

    // ---- [2/3] Email, [3/3] CMS ----
    if args.skip_email {
        info!("[2/3] Email skipped");
    }
    if args.skip_cms {
        info!("[3/3] CMS skipped");
    }
    let email = (!args.skip_email).then(|| SmtpMailer::new(config.email.clone()));
    let mut cms_setup_error = None;
    let cms = if args.skip_cms {
        None
    } else {
        match WordPressPublisher::new(config.cms.clone(), RetryPolicy::from(&config.retry), &compositor) {
            Ok(publisher) => Some(publisher),
            Err(e) => {
                error!(error = %e, "Cannot build the CMS client");
                cms_setup_error = Some(e);
                None
            }
        }
    };
    let mut dispatcher = Dispatcher::new(email, cms);
    if let Some(e) = cms_setup_error {
        dispatcher = dispatcher.with_unavailable(SinkKind::Cms, e);
    }
    let results = dispatcher.dispatch(&script).await;

    // ---- Summary ----
    for result in &results {
        println!("{result}");
    }
    let failed = results.iter().filter(|r| !r.ok).count();
    let elapsed = start_time.elapsed();
    info!(
        segments = script.segments.len(),
        sinks = results.len(),
        failed,
        elapsed_secs = elapsed.as_secs_f64(),
        "daily_newscast completed"
    );

    Ok(())
}
