mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::{BrowserTargets, CompilerOptions, CssOutputMode};
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

pub use config::ConfigFile;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CssOutput {
    Virtual,
    Physical,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Debug,
}

pub struct EnhancedCli {
    config: config::ConfigFile,
    verbosity: u8,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            verbosity: 0,
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        self.verbosity = matches.get_count("verbose");
        self.setup_logging(self.verbosity)?;

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        let result = match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("analyze", sub_matches)) => handlers::handle_analyze_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        };
        log::debug!("Finished in {}ms", self.start_time.elapsed().as_millis());
        result
    }

    fn option_args() -> Vec<Arg> {
        vec![
            Arg::new("prefix").long("prefix").value_name("PREFIX").help("Class-name prefix (default: ss)"),
            Arg::new("targets").short('t').long("targets").value_name("QUERY").help("browserslist query for vendor prefixes (repeatable)").action(ArgAction::Append),
            Arg::new("no-prefix").long("no-prefix").help("Disable vendor prefixing").action(ArgAction::SetTrue),
            Arg::new("css-output").long("css-output").value_parser(clap::value_parser!(CssOutput)).help("Expose CSS units as virtual resources or physical files"),
            Arg::new("dev").short('d').long("dev").help("Development build: pass declared names to the runtime").action(ArgAction::SetTrue),
            Arg::new("minify").short('m').long("minify").help("Minify emitted CSS").action(ArgAction::SetTrue),
            Arg::new("root").long("root").value_name("DIR").help("Project root used for stable file hashes"),
        ]
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Stylec Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.toml or .json)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Extract styles and rewrite component sources")
                    .arg(Arg::new("inputs").help("Source files or directories").required(true).num_args(1..))
                    .arg(Arg::new("out-dir").short('o').long("out-dir").value_name("DIR").help("Output directory (default: dist)"))
                    .args(Self::option_args())
                    .arg(Arg::new("source-map").long("source-map").help("Write a source map next to every rewritten file").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show compilation statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("watch").short('w').long("watch").help("Watch for file changes and recompile").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Compile sources without writing anything")
                    .arg(Arg::new("inputs").help("Source files or directories").required(true).num_args(1..))
                    .args(Self::option_args()),
            )
            .subcommand(
                Command::new("analyze")
                    .about("Show the library bindings and constructs found in a file")
                    .arg(Arg::new("input").help("Source file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write the analysis to a file"))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(OutputFormat)).default_value("debug").help("Analysis output format"))
                    .args(Self::option_args()),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    pub fn config(&self) -> &config::ConfigFile {
        &self.config
    }

    /// Defaults, then the config file, then flags
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions {
            verbose: self.verbosity >= 2,
            ..CompilerOptions::default()
        };

        if let Some(prefix) = matches
            .get_one::<String>("prefix")
            .or(self.config.class_prefix.as_ref())
        {
            options.class_prefix = prefix.clone();
        }

        let cli_targets: Vec<String> = matches
            .get_many::<String>("targets")
            .map(|targets| targets.cloned().collect())
            .unwrap_or_default();
        let prefixing_disabled =
            matches.get_flag("no-prefix") || self.config.vendor_prefixes == Some(false);
        if prefixing_disabled {
            if !cli_targets.is_empty() {
                return Err(CompilerError::config("--targets cannot be combined with --no-prefix"));
            }
            options.targets = BrowserTargets::Disabled;
        } else if !cli_targets.is_empty() {
            options.targets = BrowserTargets::Queries(cli_targets);
        } else if let Some(targets) = &self.config.targets {
            options.targets = BrowserTargets::Queries(targets.clone());
        }

        options.css_output = match matches.get_one::<CssOutput>("css-output") {
            Some(CssOutput::Virtual) => CssOutputMode::Virtual,
            Some(CssOutput::Physical) => CssOutputMode::Physical,
            None => self.config.css_output.unwrap_or_default(),
        };

        options.dev_mode = matches.get_flag("dev") || self.config.dev_mode.unwrap_or(false);
        options.minify = matches.get_flag("minify") || self.config.minify.unwrap_or(false);

        if let Some(sources) = &self.config.module_sources {
            options.module_sources = sources.clone();
        }
        if let Some(runtime_module) = &self.config.runtime_module {
            options.runtime_module = runtime_module.clone();
        }
        options.root = matches
            .get_one::<String>("root")
            .or(self.config.root.as_ref())
            .map(PathBuf::from);

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(args: &[&str]) -> clap::ArgMatches {
        let cli = EnhancedCli::new();
        let matches = cli.build_cli().get_matches_from(args);
        match matches.subcommand() {
            Some((_, sub_matches)) => sub_matches.clone(),
            None => panic!("expected a subcommand"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut cli = EnhancedCli::new();
        cli.config = ConfigFile {
            class_prefix: Some("cfg".to_string()),
            targets: Some(vec!["firefox 100".to_string()]),
            minify: Some(true),
            ..ConfigFile::default()
        };

        let matches = matches_for(&["stylec", "check", "src", "--prefix", "cli", "--css-output", "physical"]);
        let options = cli.build_compiler_options(&matches).unwrap();
        assert_eq!(options.class_prefix, "cli");
        assert_eq!(options.targets, BrowserTargets::Queries(vec!["firefox 100".to_string()]));
        assert_eq!(options.css_output, CssOutputMode::Physical);
        assert!(options.minify);
    }

    #[test]
    fn test_no_prefix_disables_targets() {
        let cli = EnhancedCli::new();
        let matches = matches_for(&["stylec", "compile", "a.tsx", "--no-prefix", "--dev"]);
        let options = cli.build_compiler_options(&matches).unwrap();
        assert_eq!(options.targets, BrowserTargets::Disabled);
        assert!(options.dev_mode);

        let conflicting = matches_for(&["stylec", "check", "a.tsx", "--no-prefix", "-t", "defaults"]);
        assert!(cli.build_compiler_options(&conflicting).is_err());
    }

    #[test]
    fn test_invalid_prefix_is_a_config_error() {
        let cli = EnhancedCli::new();
        let matches = matches_for(&["stylec", "check", "a.tsx", "--prefix", "9lives"]);
        assert!(matches!(
            cli.build_compiler_options(&matches),
            Err(CompilerError::Config { .. })
        ));
    }
}
