//! XSD Synth CLI
//!
//! Describes an XML Schema and synthesizes documents from it.
//!
//! Usage:
//!   xsd-synth describe schema.xsd
//!   xsd-synth generate --preset "FAIA Full Version" --leaf-content tag-name
//!   xsd-synth run --url https://example.org/schema.xsd --strategy lexical-echo
//!   cat schema.xsd | xsd-synth keyrefs -

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xsd_synth::render::NO_KEYREFS;
use xsd_synth::{
    load, render_description, render_keyrefs, synthesize, LeafContent, SchemaFacility,
    SchemaSource, Strategy, SynthConfig, SynthesisInput,
};

#[derive(Parser)]
#[command(name = "xsd-synth")]
#[command(about = "Describe XML Schemas and synthesize documents from them")]
#[command(version)]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print root elements, element trees and keyrefs
    Describe {
        #[command(flatten)]
        source: SourceArgs,

        /// Describe only this element
        #[arg(short, long)]
        root: Option<String>,

        /// Deepest level expanded in element trees
        #[arg(long)]
        max_depth: Option<usize>,

        /// Emit the description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize an XML document
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe, then synthesize
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,
    },

    /// List keyref constraints
    Keyrefs {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Dump the normalized schema model as JSON
    Model {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List configured presets
    Presets,

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "xsd-synth.toml")]
        path: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Schema file, or `-` for stdin
    schema: Option<PathBuf>,

    /// Fetch the schema from a URL
    #[arg(long)]
    url: Option<String>,

    /// Use a named preset from the config
    #[arg(long)]
    preset: Option<String>,
}

impl SourceArgs {
    fn source(&self) -> SchemaSource {
        match (&self.schema, &self.url, &self.preset) {
            (_, Some(url), _) => SchemaSource::Url(url.clone()),
            (_, _, Some(name)) => SchemaSource::Preset(name.clone()),
            (Some(path), _, _) if path.as_os_str() == "-" => SchemaSource::Stdin,
            (Some(path), _, _) => SchemaSource::File(path.clone()),
            (None, None, None) => SchemaSource::Stdin,
        }
    }
}

#[derive(Args)]
struct SynthesisArgs {
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Root element to generate
    #[arg(short, long)]
    root: Option<String>,

    /// Text inside leaf elements
    #[arg(long, value_enum)]
    leaf_content: Option<LeafContent>,
}

impl SynthesisArgs {
    fn apply(&self, config: &mut SynthConfig) {
        if let Some(strategy) = self.strategy {
            config.synthesis.strategy = strategy;
        }
        if let Some(root) = &self.root {
            config.synthesis.root = Some(root.clone());
        }
        if let Some(leaf_content) = self.leaf_content {
            config.synthesis.leaf_content = leaf_content;
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = SynthConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Command::Describe {
            source,
            root,
            max_depth,
            json,
        } => {
            if let Some(depth) = max_depth {
                config.render.max_depth = depth;
            }
            let model = load(&fetch(&source, &config)?)?;
            let description = render_description(&model, root.as_deref(), &config.render)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&description)?);
            } else {
                println!("{}", description);
            }
        }

        Command::Generate {
            source,
            synthesis,
            output,
        } => {
            synthesis.apply(&mut config);
            let text = fetch(&source, &config)?;
            let model = match config.synthesis.strategy {
                Strategy::Semantic => Some(load(&text)?),
                Strategy::LexicalEcho => None,
            };
            let input = SynthesisInput {
                model: model.as_ref().map(|m| m as &dyn SchemaFacility),
                raw_text: Some(&text),
            };
            let document = synthesize(input, config.synthesis.strategy, &config.synthesis)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &document.xml)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "document written");
                }
                None => println!("{}", document.xml),
            }
        }

        Command::Run { source, synthesis } => {
            synthesis.apply(&mut config);
            let text = fetch(&source, &config)?;

            // Description and synthesis fail independently
            let model = load(&text);
            let described = model
                .as_ref()
                .map_err(ToString::to_string)
                .and_then(|m| {
                    render_description(m, None, &config.render).map_err(|e| e.to_string())
                });
            match &described {
                Ok(description) => println!("{}\n", description),
                Err(e) => eprintln!("Error: {}", e),
            }

            let input = SynthesisInput {
                model: model.as_ref().ok().map(|m| m as &dyn SchemaFacility),
                raw_text: Some(&text),
            };
            let document = synthesize(input, config.synthesis.strategy, &config.synthesis)?;
            println!("{}", document.xml);

            if described.is_err() {
                bail!("schema description failed");
            }
        }

        Command::Keyrefs { source } => {
            let model = load(&fetch(&source, &config)?)?;
            let keyrefs = render_keyrefs(&model);
            if keyrefs.is_empty() {
                println!("{}", NO_KEYREFS);
            }
            for line in keyrefs {
                println!("{}", line);
            }
        }

        Command::Model { source } => {
            let model = load(&fetch(&source, &config)?)?;
            println!("{}", serde_json::to_string_pretty(&model)?);
        }

        Command::Presets => {
            for preset in &config.presets {
                println!("{}\t{}", preset.name, preset.url);
            }
        }

        Command::Config { action } => match action {
            ConfigAction::Show => print!("{}", toml::to_string_pretty(&config)?),
            ConfigAction::Init { path } => {
                SynthConfig::default()
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path))?;
                println!("Wrote {}", path);
            }
        },
    }

    Ok(())
}

fn fetch(args: &SourceArgs, config: &SynthConfig) -> anyhow::Result<String> {
    let source = args.source();
    source
        .fetch(config)
        .with_context(|| format!("failed to read schema from {}", source))
}
