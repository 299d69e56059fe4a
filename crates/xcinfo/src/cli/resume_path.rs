use anyhow::{Result, bail};
use clap::Args;
use url::Url;
use xcinfo_fetch::ResumeDataCache;

#[derive(Args, Clone, Debug)]
pub struct ResumePathArg {
    /// Download URL
    pub url: Url,
}

pub fn run(arg: &ResumePathArg) -> Result<()> {
    match ResumeDataCache::new().location_for(&arg.url) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("no resume data location for {}", arg.url),
    }
}
