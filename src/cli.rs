use std::fmt::Display;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{ArgAction, Args, ColorChoice, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::{Generator, Shell, generate};
use clap_complete_nushell::Nushell;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde::Serialize;
use tracing::info;
use tracing_indicatif::indicatif_println;

use crate::ai::SchemaInfo;
use crate::ai::customize_testimonial::{
    CustomizationRequest, CustomizedTestimonial, customize_testimonial,
};
use crate::ai::generate_testimonial::{GenerationRequest, TestimonialDraft, generate_testimonial};
use crate::ai::provider::{OpenAIProvider, Provider};
use crate::ai::query::Query;
use crate::config::Settings;
use crate::controller::Controller;
use crate::controller::choices::{Length, Tone};
use crate::{AppError, AppResult, ai, interactive, server};

const BIN_NAME: &str = "testi-ai";

const STYLES: Styles = Styles::styled()
    .header(Style::new().bold())
    .usage(Style::new().bold())
    .error(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
    .literal(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Green))),
    )
    .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
    .valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightRed))))
    .context(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta))))
    .context_value(
        Style::new()
            .bold()
            .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
    );

/// Long-form CLI description shown in `--help`.
const LONG_ABOUT: &str = "TestiAI - Generate and tailor customer testimonials using AI

Describe a product or service and a language model drafts a realistic
testimonial for it. The draft can then be rewritten in another tone
(professional, friendly, enthusiastic, humorous) and length (short, medium, long).

Works with any OpenAI-compatible server (like \x1b]8;;https://lmstudio.ai/\x1b\\\x1b[4;36mLM Studio\x1b[24;39m\x1b]8;;\x1b\\).
The API key is read from TESTI_AI_API_KEY or OPENAI_API_KEY.";

/// TestiAI - Generate and tailor customer testimonials using AI.
#[derive(Parser, Debug, Clone)]
#[command(author, version, propagate_version = true, about, long_about = Some(LONG_ABOUT), styles = STYLES)]
pub struct Cli {
    /// Color choice for log output
    #[arg(long, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Subcommand to run
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Top-level commands supported by the CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Serve the JSON API over HTTP
    ///
    /// POST /api/generate   {"productOrServiceDetails": "..."}
    /// POST /api/customize  {"testimonialDraft": "...", "tone": "...", "length": "..."}
    /// GET  /healthz
    Serve {
        /// Address to listen on
        /// Defaults to the `server.bind` setting (127.0.0.1:8080)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Generate a testimonial draft from product or service details
    ///
    /// When a tone or length is given the draft is customized right away and
    /// both versions are printed.
    Generate {
        /// What the product or service is and does (at least 20 characters)
        details: String,

        /// Tone for an immediate customization
        #[arg(short, long, value_enum)]
        tone: Option<Tone>,

        /// Length for an immediate customization
        #[arg(short, long, value_enum)]
        length: Option<Length>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Rewrite an existing testimonial in a different tone and length
    ///
    /// Tone and length are free text here. A missing one leaves that aspect
    /// of the draft unchanged.
    Customize {
        /// The testimonial to rewrite
        #[arg(short, long)]
        draft: String,

        /// Desired tone, e.g. `humorous`
        #[arg(short, long)]
        tone: Option<String>,

        /// Desired length, e.g. `short`
        #[arg(short, long)]
        length: Option<String>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Generate and customize testimonials in an interactive session
    Interactive {
        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Manage the settings file
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// Generate shell completion for a given shell
    Completion {
        /// Output file to write the completion script to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// The shell to generate the completion for
        #[arg(value_enum)]
        shell: CompletionShell,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    Show {
        #[command(subcommand)]
        what: ShowCmd,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCmd {
    /// Write a settings file containing the defaults
    Init {
        /// Where to write the file instead of the config directory
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
        force: bool,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// Print where the settings file is looked up
    Path {
        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },
}

static SHOW_CMD_ABOUT: &str = "Show the structured queries sent to the model.
This is mainly for debugging purposes, e.g. to check a prompt against a new model
or to see which JSON schema the server must support.";

#[derive(Subcommand, Debug, Clone)]
#[command(about = "Show the AI queries that are available.", long_about = SHOW_CMD_ABOUT)]
pub enum ShowCmd {
    /// The JSON schema the answer must follow
    Schema {
        #[arg(value_enum)]
        query: QueryName,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },

    /// The prompt template, with `{{placeholders}}` left in
    Prompt {
        #[arg(value_enum)]
        query: QueryName,

        #[command(flatten)]
        verbosity: Verbosity<InfoLevel>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum QueryName {
    Generation,
    Customization,
}

impl QueryName {
    fn schema(&self) -> AppResult<String> {
        let format = match self {
            QueryName::Generation => TestimonialDraft::response_format(),
            QueryName::Customization => CustomizedTestimonial::response_format(),
        };
        Ok(serde_json::to_string_pretty(&format)?)
    }

    fn template(&self) -> AppResult<String> {
        match self {
            QueryName::Generation => TestimonialDraft::template(),
            QueryName::Customization => CustomizedTestimonial::template(),
        }
    }

    fn title(&self) -> String {
        match self {
            QueryName::Generation => TestimonialDraft::title(),
            QueryName::Customization => CustomizedTestimonial::title(),
        }
    }
}

/// Supported completion targets for shell auto-completion.
#[derive(ValueEnum, Clone, Debug)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
    Nushell,
}

impl Display for CompletionShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompletionShell::Bash => "bash",
            CompletionShell::Zsh => "zsh",
            CompletionShell::Fish => "fish",
            CompletionShell::PowerShell => "powershell",
            CompletionShell::Elvish => "elvish",
            CompletionShell::Nushell => "nushell",
        };
        write!(f, "{}", s)
    }
}

impl Generator for &CompletionShell {
    fn generate(&self, cmd: &clap::builder::Command, buf: &mut dyn Write) {
        match self {
            CompletionShell::Bash => Shell::Bash.generate(cmd, buf),
            CompletionShell::Zsh => Shell::Zsh.generate(cmd, buf),
            CompletionShell::Fish => Shell::Fish.generate(cmd, buf),
            CompletionShell::PowerShell => Shell::PowerShell.generate(cmd, buf),
            CompletionShell::Elvish => Shell::Elvish.generate(cmd, buf),
            CompletionShell::Nushell => Nushell.generate(cmd, buf),
        }
    }

    fn file_name(&self, name: &str) -> String {
        match self {
            CompletionShell::Bash => Shell::Bash.file_name(name),
            CompletionShell::Zsh => Shell::Zsh.file_name(name),
            CompletionShell::Fish => Shell::Fish.file_name(name),
            CompletionShell::PowerShell => Shell::PowerShell.file_name(name),
            CompletionShell::Elvish => Shell::Elvish.file_name(name),
            CompletionShell::Nushell => Nushell.file_name(name),
        }
    }
}

/// How results are printed.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Print the result as JSON instead of plain text
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub json: bool,
}

/// Language model server options. Each one overrides the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Settings file to use instead of the one in the config directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Whether to use secure connection (HTTPS) to the language model server
    /// Defaults to false for local servers (i.e. `localhost` and private subnets)
    /// Defaults to true for public IP addresses and hostnames
    /// Note: This is not a flag. You must provide a value (true or false) if you use this option.
    #[arg(long)]
    pub secure: Option<bool>,

    /// Host for the language model server [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the language model server [default: 1234]
    #[arg(long)]
    pub port: Option<u16>,

    /// OpenAI API version for the language model server [default: v1]
    #[arg(long)]
    pub api_version: Option<String>,

    /// Model identifier [default: openai/gpt-oss-20b]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 2 [default: 0.7]
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Per-request timeout, e.g. `30s` or `2m` [default: 60s]
    #[arg(long)]
    pub timeout: Option<String>,
}

impl ProviderArgs {
    /// Settings file (or defaults) with these flags applied on top.
    pub fn settings(&self) -> AppResult<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        self.apply(&mut settings);
        settings.provider.timeout()?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        let p = &mut settings.provider;
        if let Some(secure) = self.secure {
            p.secure = Some(secure);
        }
        if let Some(host) = &self.host {
            p.host = host.clone();
        }
        if let Some(port) = self.port {
            p.port = port;
        }
        if let Some(api_version) = &self.api_version {
            p.api_version = api_version.clone();
        }
        if let Some(model) = &self.model {
            p.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            p.temperature = temperature;
        }
        if let Some(timeout) = &self.timeout {
            p.timeout = timeout.clone();
        }
    }
}

/// Build the provider described by `settings`.
pub fn build_provider(settings: &Settings) -> AppResult<Arc<dyn Provider>> {
    let p = &settings.provider;
    let api_key = p.api_key();
    let client = ai::get_client(&p.api_base(), api_key.as_deref(), p.timeout()?)?;
    info!("Using model {} at {}", p.model, p.api_base());
    Ok(Arc::new(OpenAIProvider::new(
        client,
        p.model.clone(),
        p.temperature,
    )))
}

/// Helper trait for accessing verbosity flags on commands.
pub trait GetVerbosity {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel>;
}

impl GetVerbosity for Cmd {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            Cmd::Serve { verbosity, .. } => verbosity,
            Cmd::Generate { verbosity, .. } => verbosity,
            Cmd::Customize { verbosity, .. } => verbosity,
            Cmd::Interactive { verbosity, .. } => verbosity,
            Cmd::Completion { verbosity, .. } => verbosity,
            Cmd::Config { cmd } => cmd.get_verbosity(),
            Cmd::Show { what } => what.get_verbosity(),
        }
    }
}

impl GetVerbosity for ConfigCmd {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            ConfigCmd::Init { verbosity, .. } => verbosity,
            ConfigCmd::Path { verbosity } => verbosity,
        }
    }
}

impl GetVerbosity for ShowCmd {
    fn get_verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            ShowCmd::Schema { verbosity, .. } => verbosity,
            ShowCmd::Prompt { verbosity, .. } => verbosity,
        }
    }
}

/// Both versions produced by `generate --tone/--length`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedOutput {
    #[serde(flatten)]
    draft: TestimonialDraft,
    #[serde(flatten)]
    customized: Option<CustomizedTestimonial>,
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    indicatif_println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Cmd {
    /// Execute the chosen top-level command.
    #[tracing::instrument(name = "Running command", level = "info", skip(self))]
    pub async fn run(&self) -> AppResult<()> {
        match self {
            Cmd::Serve { bind, provider, .. } => {
                let settings = provider.settings()?;
                let bind = bind.unwrap_or(settings.server.bind);
                let state = server::AppState::new(build_provider(&settings)?);
                server::serve(bind, state).await
            }
            Cmd::Generate {
                details,
                tone,
                length,
                output,
                provider,
                ..
            } => {
                let request = GenerationRequest::new(details.as_str());
                request.validate()?;
                let provider = build_provider(&provider.settings()?)?;
                self.run_generate(provider.as_ref(), &request, *tone, *length, output.json)
                    .await
            }
            Cmd::Customize {
                draft,
                tone,
                length,
                output,
                provider,
                ..
            } => {
                let request = CustomizationRequest {
                    testimonial_draft: draft.clone(),
                    tone: tone.clone(),
                    length: length.clone(),
                };
                request.validate()?;
                let provider = build_provider(&provider.settings()?)?;
                let customized = customize_testimonial(provider.as_ref(), &request).await?;
                if output.json {
                    print_json(&customized)
                } else {
                    indicatif_println!("{customized}");
                    Ok(())
                }
            }
            Cmd::Interactive { provider, .. } => {
                let provider = build_provider(&provider.settings()?)?;
                interactive::run(Arc::new(Controller::new(provider))).await
            }
            Cmd::Config { cmd } => cmd.run().await,
            Cmd::Completion { shell, output, .. } => {
                let mut cmd = Cli::command();
                if let Some(output_path) = output {
                    let mut file = std::fs::OpenOptions::new()
                        .write(true)
                        .truncate(true)
                        .create(true)
                        .open(output_path)?;
                    generate(shell, &mut cmd, BIN_NAME, &mut file);
                    info!(
                        "Generated completion script for {} at {}",
                        shell,
                        output_path.display()
                    );
                } else {
                    generate(shell, &mut cmd, BIN_NAME, &mut std::io::stdout());
                }
                Ok(())
            }
            Cmd::Show { what } => what.run(),
        }
    }

    #[tracing::instrument(name = "Generating", level = "info", skip(self, provider, request))]
    async fn run_generate(
        &self,
        provider: &dyn Provider,
        request: &GenerationRequest,
        tone: Option<Tone>,
        length: Option<Length>,
        json: bool,
    ) -> AppResult<()> {
        let draft = generate_testimonial(provider, request).await?;

        let customized = if tone.is_some() || length.is_some() {
            let request = CustomizationRequest::new(draft.testimonial_draft.as_str())
                .tone(tone.unwrap_or_default().as_str())
                .length(length.unwrap_or_default().as_str());
            Some(customize_testimonial(provider, &request).await?)
        } else {
            None
        };

        if json {
            return print_json(&GeneratedOutput { draft, customized });
        }
        indicatif_println!("{draft}");
        if let Some(customized) = customized {
            indicatif_println!("\n{customized}");
        }
        Ok(())
    }
}

impl ConfigCmd {
    pub async fn run(&self) -> AppResult<()> {
        match self {
            ConfigCmd::Init { path, force, .. } => {
                let target = match path {
                    Some(p) => p.clone(),
                    None => Settings::default_path()?,
                };
                if target.exists() && !force {
                    return Err(AppError::Config(format!(
                        "{} already exists, pass --force to overwrite it",
                        target.display()
                    )));
                }
                let written = Settings::write_default(path.as_deref()).await?;
                info!("Wrote default settings to {}", written.display());
                Ok(())
            }
            ConfigCmd::Path { .. } => {
                indicatif_println!("{}", Settings::default_path()?.display());
                Ok(())
            }
        }
    }
}

impl ShowCmd {
    pub fn run(&self) -> AppResult<()> {
        match self {
            ShowCmd::Schema { query, .. } => {
                let schema = query.schema()?;
                indicatif_println!("Schema for {}:\n{schema}", query.title());
            }
            ShowCmd::Prompt { query, .. } => {
                let template = query.template()?;
                indicatif_println!("Prompt for {}:\n{template}", query.title());
            }
        }
        Ok(())
    }
}
