use clap::{Parser, Subcommand};
use podsite::builder::{BuildError, BuildOptions};
use podsite::pod::Pod;
use podsite::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "podsite")]
#[command(about = "Build and export static sites from a pod of content")]
#[command(long_about = "\
Build and export static sites from a pod of content

A pod is a directory with markdown documents, static files, and an optional
podsite.toml:

  my-site/
  ├── podsite.toml          # Optional config (see gen-config)
  ├── content/              # index.md → /, about.md → /about/
  ├── static/               # Copied byte-for-byte under serve_at
  ├── translations/de.yaml  # Layout strings per extra locale
  └── build/                # Output, with .control/manifest.json

Every build is staged beside the output directory and only committed when
every route succeeded. Builds restricted with --pattern never delete output.

Run 'podsite gen-config' to generate a documented podsite.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the pod into its output directory
    Build {
        /// Pod root
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Only rebuild routes whose source matches one of these globs
        /// (relative to the pod root); never deletes output
        #[arg(long, num_args = 1..)]
        pattern: Vec<String>,
        /// Write missing translations to .control/locales/<locale>.yaml
        #[arg(long)]
        write_locales: bool,
    },
    /// Copy a finished build into a separately tracked publish directory
    Export {
        /// Pod root
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Publish directory
        #[arg(long)]
        export_dir: PathBuf,
        /// Build directory to export from (default: the pod's output_dir)
        #[arg(long)]
        build_dir: Option<PathBuf>,
        /// Where the export manifest is kept (default: <export-dir>/.control)
        #[arg(long)]
        export_control_dir: Option<PathBuf>,
    },
    /// List every route the pod defines
    Routes {
        /// Pod root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Print a stock podsite.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            root,
            pattern,
            write_locales,
        } => {
            let pod = Pod::open(&root)?;
            let options = BuildOptions {
                patterns: pattern,
                write_locales,
            };
            match pod.build(&options) {
                Ok(result) => output::print_build_summary(&result),
                Err(BuildError::RouteBuild { failures }) => {
                    output::print_route_failures(&failures);
                    return Err(BuildError::RouteBuild { failures }.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Export {
            root,
            export_dir,
            build_dir,
            export_control_dir,
        } => {
            let pod = Pod::open(&root)?;
            let mut options = pod.export_options(&export_dir);
            if let Some(build_dir) = build_dir {
                options.build_dir = build_dir;
            }
            options.export_control_dir = export_control_dir;
            let result = pod.export(&options)?;
            output::print_export_summary(&result, &export_dir);
        }
        Command::Routes { root } => {
            let pod = Pod::open(&root)?;
            let entries = pod.router().entries()?;
            output::print_routes(&entries, pod.root());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `podsite=info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podsite=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
