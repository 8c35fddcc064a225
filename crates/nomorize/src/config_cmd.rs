use anyhow::Result;
use nmz_config::NomorizeConfig;
use nmz_core::OutputFormat;

pub(crate) fn handle_config_show(format: OutputFormat) -> Result<()> {
    let config = NomorizeConfig::load()?.redacted_for_display();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Text => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

pub(crate) fn handle_config_init() -> Result<()> {
    let path = NomorizeConfig::config_path()?;
    NomorizeConfig::save_default_template(&path)?;
    eprintln!("Wrote default configuration to: {}", path.display());
    Ok(())
}

pub(crate) fn handle_config_path() -> Result<()> {
    println!("{}", NomorizeConfig::config_path()?.display());
    Ok(())
}
