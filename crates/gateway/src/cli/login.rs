//! `blah-code login` — prompt for an API key and store it in the
//! credentials file.

use bc_domain::config::StatePaths;

pub fn login(paths: &StatePaths) -> anyhow::Result<()> {
    let api_key = rpassword::prompt_password("API key: ")?;
    if api_key.trim().is_empty() {
        anyhow::bail!("no API key entered");
    }
    bc_providers::save_api_key(paths, &api_key)?;
    println!("Saved credentials to {}", paths.credentials_path().display());
    Ok(())
}
