//! Configuration inspection commands.

use console::style;

use crate::config::Config;
use crate::filter::AnnotationFilter;

/// Print the lexicon with ids and its fingerprint.
pub fn cmd_lexicon(config: &Config) -> anyhow::Result<()> {
    let filter = AnnotationFilter::from_config(config);
    let lexicon = filter.lexicon();

    if lexicon.is_empty() {
        println!(
            "{} Lexicon is empty (set annotation.types / annotation.features)",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("{} {}", style("Fingerprint:").bold(), lexicon.fingerprint());
    for (id, name) in lexicon.iter().enumerate() {
        println!("  {:>4}  {}", style(id).dim(), name);
    }
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn cmd_config(config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file found, using defaults"),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
