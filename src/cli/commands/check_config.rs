use crate::config::Config;

pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    let mut printable = config.clone();
    if printable.auth.jwt_secret.is_some() {
        printable.auth.jwt_secret = Some("********".to_string());
    }

    println!("Configuration OK");
    println!("{:-<70}", "");
    print!("{}", toml::to_string_pretty(&printable)?);
    Ok(())
}
