// ABOUTME: Run command: drives one transition end to end with hooks around it.
// ABOUTME: Prints per-step progress and the exact resume command on failure.

use super::load;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::exec::SshExecutor;
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::output::Output;
use crate::provision::NullProvisioner;
use crate::registry::FsRegistry;
use crate::transition::{ExecuteOptions, TransitionExecutor, TransitionReport};

pub async fn run(
    site: &str,
    transition: &str,
    dry_run: bool,
    from_step: Option<usize>,
    auto_confirm: bool,
    output: &mut Output,
) -> Result<()> {
    let (config, site, cwd) = load(site)?;
    let registry = FsRegistry::new(config.state_dir());
    let remote = SshExecutor::new(config.trust_first_connection);
    let provisioner = NullProvisioner;
    let executor = TransitionExecutor::new(&config, &registry, &remote, &provisioner);
    let hook_runner = HookRunner::new(&cwd);

    let hook_context = executor.definitions().get(transition).map(|def| HookContext {
        site: site.clone(),
        transition: def.name.to_string(),
        source_tier: def.source,
        dest_tier: def.dest,
    });

    if !dry_run
        && let Some(context) = &hook_context
        && let Some(result) = hook_runner.run(HookPoint::PreTransition, context).await
        && !result.success
    {
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr);
        }
        return Err(Error::Hook("pre-transition hook failed".to_string()));
    }

    let opts = ExecuteOptions {
        dry_run,
        step_override: from_step.map(|n| n.saturating_sub(1)),
        auto_confirm,
    };

    output.start_timer();
    output.progress(&format!("Running {transition} for {site}"));

    let result = executor.execute(&site, transition, &opts).await;
    remote.disconnect_all().await;

    let mut diag = Diagnostics::default();

    match result {
        Ok(report) => {
            print_report(&report, output);

            if !dry_run
                && let Some(context) = &hook_context
                && let Some(hook) = hook_runner.run(HookPoint::PostTransition, context).await
                && !hook.success
            {
                diag.warn(Warning::follow_up("post-transition hook failed"));
            }

            for warning in &report.warnings {
                diag.warn(Warning::follow_up(warning.clone()));
            }
            for warning in diag.warnings() {
                output.warning(&warning.message);
            }

            if dry_run {
                output.success("Dry run complete; nothing was changed");
            } else {
                output.success(&format!("Transition {transition} complete"));
            }
            Ok(())
        }
        Err(e) => {
            if !dry_run
                && let Some(context) = &hook_context
                && let Some(hook) = hook_runner.run(HookPoint::OnError, context).await
                && !hook.success
            {
                output.warning("on-error hook failed");
            }
            Err(e.into())
        }
    }
}

fn print_report(report: &TransitionReport, output: &Output) {
    for nested in &report.nested {
        output.progress(&format!("  → Ran {} first:", nested.transition));
        print_report(nested, output);
    }
    for step in &report.steps {
        output.progress(&format!("  [{}] {}: {}", step.index + 1, step.name, step.detail));
    }
    if report.swapped {
        output.progress("  ✓ Blue-green swap performed");
    }
}
