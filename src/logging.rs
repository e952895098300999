use std::io::IsTerminal;

use clap::ColorChoice;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that overrides the verbosity flags.
pub const LOG_ENV_VAR: &str = "TESTI_AI_LOG";

pub fn setup_logger(verbosity: &Verbosity<InfoLevel>, color: ColorChoice) {
    let indicatif_layer = IndicatifLayer::new();

    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let fmt = fmt::layer()
        .with_ansi(use_ansi(color, std::io::stderr().is_terminal()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_writer(indicatif_layer.get_stderr_writer())
        .pretty();

    tracing_subscriber::registry()
        .with(fmt)
        .with(indicatif_layer)
        .with(env_filter)
        .init();
}

/// `auto` colors only when stderr is a terminal and `NO_COLOR` is unset.
fn use_ansi(color: ColorChoice, is_terminal: bool) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => is_terminal && std::env::var_os("NO_COLOR").is_none(),
    }
}
