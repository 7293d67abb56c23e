//! Status reporting across environments.

use anyhow::Result;
use colored::Colorize;

use crate::store::ReleaseStore;

use super::GlobalOpts;

/// `status roadmap`: configured environments with their current
/// release and recent deployment activity.
pub async fn roadmap(opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let workdir = opts.workdir()?;
    let store = ReleaseStore::open(&workdir)?;

    println!("{}", config.project.name.cyan().bold());
    for env_name in config.environments.keys() {
        let releases = store.list_releases(env_name);
        let current = store.get_current_release(env_name).ok();

        let summary = match (&current, releases.len()) {
            (Some(current), _) => format!(
                "current {} (version {})",
                current.id,
                current.version.yellow()
            ),
            (None, 0) => "never deployed".dimmed().to_string(),
            (None, n) => format!("{n} attempt(s), none finalized"),
        };
        println!("   {:<12} {}", env_name, summary);

        let failed = releases
            .iter()
            .filter(|r| r.overall_status() == "failed")
            .count();
        if failed > 0 {
            println!("   {:<12} {}", "", format!("{failed} failed release(s)").red());
        }
    }
    Ok(())
}
