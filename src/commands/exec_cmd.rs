// ABOUTME: Exec command: run an ad-hoc shell command on a tier's target.
// ABOUTME: Uses the registry record when present, else the declared binding.

use super::{load, parse_tier};
use crate::error::{Error, Result};
use crate::exec::{RemoteExecutor, SshExecutor};
use crate::registry::{EnvironmentRegistry, FsRegistry};

pub async fn exec(site: &str, tier: &str, command: &[String]) -> Result<()> {
    let (config, site, _cwd) = load(site)?;
    let tier = parse_tier(tier)?;

    let registry = FsRegistry::new(config.state_dir());
    let target = match registry.get(&site, tier)? {
        Some(env) => env.target,
        None => config.binding(&site, tier)?.target(),
    };

    let remote = SshExecutor::new(config.trust_first_connection);
    let command = command.join(" ");
    let output = remote
        .run(&target, &command, config.policy.command_timeout)
        .await?;
    remote.disconnect_all().await;

    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    if !output.success() {
        return Err(Error::CommandFailed(output.exit_code));
    }
    Ok(())
}
