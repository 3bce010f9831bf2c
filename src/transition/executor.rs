// ABOUTME: Top-level transition driver: lock, resume, step loop, swap, unlock.
// ABOUTME: Transition-agnostic; everything it runs comes from the definition registry.

use super::definition::{
    Precondition, Step, StepKind, SyncEndpoint, TargetRole, TemplateContext,
    TransitionDefinition, TransitionRegistry, Verify,
};
use super::error::TransitionError;
use super::tracker::{PendingSequence, StepStatus, StepTracker};
use crate::config::Config;
use crate::exec::RemoteExecutor;
use crate::provision::{self, DnsOutcome, Provisioner, ServerSpec};
use crate::registry::{EnvStatus, Environment, EnvironmentRegistry};
use crate::swap::{BlueGreenSwapper, SnapshotStore};
use crate::types::{SiteName, Target, Tier, TransitionId};
use futures::future::BoxFuture;

/// Nested auto-provisioning is at most one level deep by construction
/// (provisioning transitions have no source); the cap is a backstop.
const MAX_NESTING: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Evaluate preconditions and report the plan without mutating anything.
    pub dry_run: bool,
    /// Operator-forced starting step (0-based), overriding the resume point.
    pub step_override: Option<usize>,
    /// Confirm swap-bearing transitions without prompting.
    pub auto_confirm: bool,
}

/// What happened (or would happen) at one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub index: usize,
    pub name: String,
    pub detail: String,
}

/// Result of one `execute` call, including nested provisioning runs.
#[derive(Debug, Default)]
pub struct TransitionReport {
    pub transition: String,
    pub transition_id: Option<TransitionId>,
    pub steps: Vec<StepOutcome>,
    pub swapped: bool,
    pub dry_run: bool,
    pub warnings: Vec<String>,
    pub nested: Vec<TransitionReport>,
}

/// Drives a named transition for a site: resolves the definition, locks the
/// destination tier, resumes from the journal, and runs each step through
/// the RemoteExecutor.
pub struct TransitionExecutor<'a, E: RemoteExecutor, P: Provisioner> {
    config: &'a Config,
    registry: &'a dyn EnvironmentRegistry,
    remote: &'a E,
    provisioner: &'a P,
    definitions: TransitionRegistry,
    tracker: StepTracker,
    snapshots: SnapshotStore,
}

impl<'a, E: RemoteExecutor, P: Provisioner> TransitionExecutor<'a, E, P> {
    pub fn new(
        config: &'a Config,
        registry: &'a dyn EnvironmentRegistry,
        remote: &'a E,
        provisioner: &'a P,
    ) -> Self {
        let state_dir = config.state_dir();
        Self {
            config,
            registry,
            remote,
            provisioner,
            definitions: TransitionRegistry::builtin(),
            tracker: StepTracker::new(&state_dir),
            snapshots: SnapshotStore::new(&state_dir),
        }
    }

    pub fn definitions(&self) -> &TransitionRegistry {
        &self.definitions
    }

    pub async fn execute(
        &self,
        site: &SiteName,
        name: &str,
        opts: &ExecuteOptions,
    ) -> Result<TransitionReport, TransitionError> {
        self.execute_nested(site, name.to_string(), opts.clone(), 0)
            .await
    }

    fn execute_nested<'x>(
        &'x self,
        site: &'x SiteName,
        name: String,
        opts: ExecuteOptions,
        depth: usize,
    ) -> BoxFuture<'x, Result<TransitionReport, TransitionError>> {
        Box::pin(async move {
            let def = self
                .definitions
                .get(&name)
                .ok_or_else(|| TransitionError::Unknown(name.clone()))?;

            if def.swap && !opts.auto_confirm && !opts.dry_run {
                return Err(TransitionError::ConfirmationRequired {
                    name: def.name.to_string(),
                });
            }

            let mut report = TransitionReport {
                transition: def.name.to_string(),
                dry_run: opts.dry_run,
                ..Default::default()
            };

            if !opts.dry_run && depth < MAX_NESTING {
                self.provision_absent_tiers(site, def, depth, &mut report)
                    .await?;
            }

            let source_env = match def.source {
                Some(tier) => Some(self.resolve_env(site, tier, !opts.dry_run).await?),
                None => None,
            };
            let dest_env = self.resolve_env(site, def.dest, !opts.dry_run).await?;
            let ctx = self.template_context(site, source_env.as_ref(), &dest_env);

            let sequence = self
                .tracker
                .prepare(site, def.name, def.steps.len())?;
            let start = opts.step_override.unwrap_or(sequence.resume_point);

            if opts.dry_run {
                self.plan(def, start, &ctx, source_env.as_ref(), &dest_env, &mut report);
                return Ok(report);
            }

            let lock = self.registry.acquire_lock(
                site,
                def.dest,
                &sequence.id,
                self.config.policy.stale_lock_after,
            )?;
            report.transition_id = Some(sequence.id.clone());

            let result = self
                .run_locked(
                    site,
                    def,
                    &sequence,
                    start,
                    &ctx,
                    source_env.as_ref(),
                    &dest_env,
                    &mut report,
                )
                .await;

            if let Err(e) = lock.release() {
                tracing::warn!("failed to release tier lock: {e}");
                report.warnings
                    .push(format!("failed to release tier lock: {e}"));
            }

            result.map(|_| report)
        })
    }

    /// Run provisioning transitions for any absent tier this transition
    /// touches, policy permitting.
    async fn provision_absent_tiers(
        &self,
        site: &SiteName,
        def: &TransitionDefinition,
        depth: usize,
        report: &mut TransitionReport,
    ) -> Result<(), TransitionError> {
        let tiers = def.source.into_iter().chain(std::iter::once(def.dest));

        for tier in tiers {
            let Some(prov) = self.definitions.provisioning_for(tier) else {
                continue;
            };
            if prov.name == def.name {
                continue;
            }
            if !self.config.policy.auto_provision {
                continue;
            }
            if tier == Tier::Live && !self.config.policy.auto_live {
                continue;
            }

            let env = self.resolve_env(site, tier, true).await?;
            if env.is_active() {
                continue;
            }

            tracing::info!(%site, %tier, "tier absent; running {} first", prov.name);
            let nested_opts = ExecuteOptions {
                dry_run: false,
                step_override: None,
                auto_confirm: true,
            };
            let nested = self
                .execute_nested(site, prov.name.to_string(), nested_opts, depth + 1)
                .await?;
            report.warnings.extend(nested.warnings.iter().cloned());
            report.nested.push(nested);
        }
        Ok(())
    }

    /// Registry record for (site, tier), adopting a pre-existing root as an
    /// active environment when permitted, otherwise an unpersisted Absent
    /// record carrying the declared binding.
    async fn resolve_env(
        &self,
        site: &SiteName,
        tier: Tier,
        adopt: bool,
    ) -> Result<Environment, TransitionError> {
        if let Some(env) = self.registry.get(site, tier)? {
            return Ok(env);
        }

        let binding = self
            .config
            .binding(site, tier)
            .map_err(|e| TransitionError::Config(e.to_string()))?;
        let env = Environment::absent(
            site.clone(),
            tier,
            binding.target(),
            binding.domain.clone(),
        );

        let probe = format!(r#"test -d "{}""#, env.target.root_str());
        let root_exists = self
            .remote
            .run(&env.target, &probe, self.config.policy.command_timeout)
            .await
            .map(|o| o.success())
            .unwrap_or(false);

        if root_exists && adopt {
            // A tier managed outside terrace: record it so the graph sees it.
            let adopted = env.with_status(EnvStatus::Active);
            self.registry.put(&adopted)?;
            tracing::info!(%site, %tier, "adopted existing environment");
            return Ok(adopted);
        }

        Ok(env)
    }

    fn template_context(
        &self,
        site: &SiteName,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> TemplateContext {
        TemplateContext {
            site: site.to_string(),
            source_root: source_env.map(|e| e.target.root_str()).unwrap_or_default(),
            source_domain: source_env.map(|e| e.domain.clone()).unwrap_or_default(),
            dest_root: dest_env.target.root_str(),
            dest_domain: dest_env.domain.clone(),
            marker: self.config.health.marker.clone(),
        }
    }

    /// Dry run: evaluate preconditions, report what each remaining step
    /// would do, mutate nothing.
    fn plan(
        &self,
        def: &TransitionDefinition,
        start: usize,
        ctx: &TemplateContext,
        source_env: Option<&Environment>,
        dest_env: &Environment,
        report: &mut TransitionReport,
    ) {
        for (i, step) in def.steps.iter().enumerate().skip(start) {
            let detail = match self.check_precondition(step.precondition, source_env, dest_env) {
                Err(blocked) => format!("blocked: {blocked}"),
                Ok(()) => format!(
                    "would run: {}",
                    self.describe_step(step, ctx, source_env, dest_env)
                ),
            };
            report.steps.push(StepOutcome {
                index: i,
                name: step.name.to_string(),
                detail,
            });
        }
        if def.swap {
            report.steps.push(StepOutcome {
                index: def.steps.len(),
                name: "swap".to_string(),
                detail: format!("would rotate blue-green aliases on tier {}", def.dest),
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_locked(
        &self,
        site: &SiteName,
        def: &TransitionDefinition,
        sequence: &PendingSequence,
        start: usize,
        ctx: &TemplateContext,
        source_env: Option<&Environment>,
        dest_env: &Environment,
        report: &mut TransitionReport,
    ) -> Result<(), TransitionError> {
        self.tracker.begin(site, def.name, sequence)?;

        for (i, step) in def.steps.iter().enumerate().skip(start) {
            if let Err(detail) =
                self.check_precondition(step.precondition, source_env, dest_env)
            {
                return Err(TransitionError::Precondition {
                    transition: def.name.to_string(),
                    index: i + 1,
                    step: step.name.to_string(),
                    detail,
                });
            }

            self.tracker
                .mark(site, def.name, &sequence.id, i, StepStatus::Running)?;

            let outcome = self
                .run_step(site, def, i, step, ctx, source_env, dest_env, report)
                .await;

            let detail = match outcome {
                Ok(detail) => detail,
                Err(e) => {
                    let _ = self
                        .tracker
                        .mark(site, def.name, &sequence.id, i, StepStatus::Failed);
                    return Err(e);
                }
            };

            if let Some(verify) = &step.verify
                && let Err(e) = self
                    .run_verify(site, def, i, step, verify, ctx, source_env, dest_env)
                    .await
            {
                let _ = self
                    .tracker
                    .mark(site, def.name, &sequence.id, i, StepStatus::Failed);
                return Err(e);
            }

            self.tracker
                .mark(site, def.name, &sequence.id, i, StepStatus::Completed)?;
            report.steps.push(StepOutcome {
                index: i,
                name: step.name.to_string(),
                detail,
            });
        }

        if def.swap {
            let swapper = BlueGreenSwapper::new(
                self.remote,
                &self.snapshots,
                self.config.health.clone(),
                self.config.policy.rollback_retention,
                self.config.policy.command_timeout,
            );
            // Steps may have updated the record (registration, server ref).
            let env = self
                .registry
                .get(site, def.dest)?
                .unwrap_or_else(|| dest_env.clone());
            swapper.swap(&env).await?;
            report.swapped = true;
        }

        Ok(())
    }

    fn check_precondition(
        &self,
        pre: Precondition,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> Result<(), String> {
        let source_active = source_env.map(Environment::is_active).unwrap_or(false);
        match pre {
            Precondition::None => Ok(()),
            Precondition::SourceActive => {
                if source_active {
                    Ok(())
                } else {
                    Err(match source_env {
                        Some(env) => format!("source tier {} is not active", env.tier),
                        None => "transition has no source tier".to_string(),
                    })
                }
            }
            Precondition::BothActive => {
                if !source_active {
                    return Err(match source_env {
                        Some(env) => format!("source tier {} is not active", env.tier),
                        None => "transition has no source tier".to_string(),
                    });
                }
                if dest_env.is_active() {
                    Ok(())
                } else {
                    Err(format!("destination tier {} is not active", dest_env.tier))
                }
            }
            Precondition::DestNotActive => {
                if dest_env.is_active() {
                    Err(format!(
                        "destination tier {} already exists; deprovision it first",
                        dest_env.tier
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn role_target(
        &self,
        role: TargetRole,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> Result<Target, TransitionError> {
        match role {
            TargetRole::Source => source_env
                .map(|e| e.target.clone())
                .ok_or_else(|| {
                    TransitionError::Config("step requires a source tier".to_string())
                }),
            TargetRole::Dest => Ok(dest_env.target.clone()),
            TargetRole::Control => Ok(Target::local(".")),
        }
    }

    fn role_env<'e>(
        &self,
        role: TargetRole,
        source_env: Option<&'e Environment>,
        dest_env: &'e Environment,
    ) -> Result<&'e Environment, TransitionError> {
        match role {
            TargetRole::Source => source_env.ok_or_else(|| {
                TransitionError::Config("step requires a source tier".to_string())
            }),
            TargetRole::Dest => Ok(dest_env),
            TargetRole::Control => Err(TransitionError::Config(
                "sync endpoints must be tiers".to_string(),
            )),
        }
    }

    /// Command that copies `from` alias content over `to` alias content.
    /// Same-host syncs run on that host; cross-host syncs rsync from the
    /// control machine.
    fn sync_command(
        &self,
        from: &SyncEndpoint,
        to: &SyncEndpoint,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> Result<(Target, String), TransitionError> {
        let from_env = self.role_env(from.role, source_env, dest_env)?;
        let to_env = self.role_env(to.role, source_env, dest_env)?;

        let same_host = match (&from_env.target, &to_env.target) {
            (Target::Local { .. }, Target::Local { .. }) => true,
            (Target::Remote { host: a, .. }, Target::Remote { host: b, .. }) => a == b,
            _ => false,
        };

        if same_host {
            let from_path = format!("{}/{}", from_env.target.root_str(), from.alias);
            let to_path = format!("{}/{}", to_env.target.root_str(), to.alias);
            let command = format!(
                r#"find "{to_path}/" -mindepth 1 -delete && cp -a "{from_path}/." "{to_path}/""#
            );
            return Ok((to_env.target.clone(), command));
        }

        let endpoint = |target: &Target, alias: &str| match target {
            Target::Local { root } => format!("{}/{}/", root.display(), alias),
            Target::Remote {
                host, user, root, ..
            } => {
                let user = user
                    .as_ref()
                    .map(|u| format!("{u}@"))
                    .unwrap_or_default();
                format!("{user}{host}:{}/{}/", root.display(), alias)
            }
        };
        let command = format!(
            r#"rsync -a --delete "{}" "{}""#,
            endpoint(&from_env.target, from.alias),
            endpoint(&to_env.target, to.alias)
        );
        Ok((Target::local("."), command))
    }

    fn describe_step(
        &self,
        step: &Step,
        ctx: &TemplateContext,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> String {
        match &step.kind {
            StepKind::Command { template, .. } => ctx.render(template),
            StepKind::SyncContent { from, to } => self
                .sync_command(from, to, source_env, dest_env)
                .map(|(_, cmd)| cmd)
                .unwrap_or_else(|e| e.to_string()),
            StepKind::CreateServer => {
                format!("allocate a server for tier {} via the provisioner", dest_env.tier)
            }
            StepKind::AwaitReady => "poll the provisioned server until ready".to_string(),
            StepKind::ConfigureDns => {
                format!("wait for {} to resolve (non-fatal)", dest_env.domain)
            }
            StepKind::InitSlots => {
                format!("create slot layout under {}", dest_env.target.root_str())
            }
            StepKind::RegisterEnvironment => {
                format!("register tier {} as active", dest_env.tier)
            }
        }
    }

    fn step_failed(
        &self,
        site: &SiteName,
        def: &TransitionDefinition,
        index: usize,
        step: &Step,
        exit_code: i32,
        detail: String,
    ) -> TransitionError {
        TransitionError::StepFailed {
            transition: def.name.to_string(),
            index: index + 1,
            step: step.name.to_string(),
            site: site.clone(),
            tier: def.dest,
            exit_code,
            detail,
            resume: format!("terrace run {site} {}", def.name),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        site: &SiteName,
        def: &TransitionDefinition,
        index: usize,
        step: &Step,
        ctx: &TemplateContext,
        source_env: Option<&Environment>,
        dest_env: &Environment,
        report: &mut TransitionReport,
    ) -> Result<String, TransitionError> {
        let timeout = self.config.policy.command_timeout;

        match &step.kind {
            StepKind::Command { role, template } => {
                let target = self.role_target(*role, source_env, dest_env)?;
                let command = ctx.render(template);
                let output = self.remote.run(&target, &command, timeout).await?;
                if !output.success() {
                    return Err(self.step_failed(
                        site,
                        def,
                        index,
                        step,
                        output.exit_code,
                        output.detail().to_string(),
                    ));
                }
                Ok(command)
            }

            StepKind::SyncContent { from, to } => {
                let (target, command) =
                    self.sync_command(from, to, source_env, dest_env)?;
                let output = self.remote.run(&target, &command, timeout).await?;
                if !output.success() {
                    return Err(self.step_failed(
                        site,
                        def,
                        index,
                        step,
                        output.exit_code,
                        output.detail().to_string(),
                    ));
                }
                Ok(command)
            }

            StepKind::CreateServer => {
                let spec = ServerSpec {
                    site: site.clone(),
                    tier: def.dest,
                    domain: dest_env.domain.clone(),
                };
                let server = self.provisioner.create_server(&spec).await?;

                let mut env = dest_env.clone().with_status(EnvStatus::Provisioning);
                env.server = Some(server.clone());
                self.registry.put(&env)?;
                Ok(format!("created server {server}"))
            }

            StepKind::AwaitReady => {
                let env = self.registry.get(site, def.dest)?;
                let server = env.and_then(|e| e.server).ok_or_else(|| {
                    TransitionError::Config(format!(
                        "no server recorded for tier {}; create-server must run first",
                        def.dest
                    ))
                })?;
                provision::wait_ready(
                    self.provisioner,
                    &server,
                    self.config.policy.provision_retries,
                    self.config.policy.provision_backoff,
                )
                .await?;
                Ok(format!("server {server} ready"))
            }

            StepKind::ConfigureDns => {
                match provision::wait_dns(&dest_env.domain, self.config.policy.dns_timeout).await
                {
                    DnsOutcome::Propagated => Ok(format!("{} resolves", dest_env.domain)),
                    DnsOutcome::TimedOut { domain } => {
                        // Non-fatal: the transition completes; the operator
                        // follows up on DNS manually.
                        let warning = format!(
                            "DNS for {domain} did not resolve within {:?}; verify the record manually",
                            self.config.policy.dns_timeout
                        );
                        tracing::warn!("{warning}");
                        report.warnings.push(warning);
                        Ok(format!("{domain} not yet resolving (non-fatal)"))
                    }
                }
            }

            StepKind::InitSlots => {
                let root = dest_env.target.root_str();
                let command = format!(
                    r#"mkdir -p "{root}/releases/slot-a" "{root}/releases/slot-b" "{root}/releases/slot-c" && cd "{root}" && {{ [ -h current ] || ln -s releases/slot-a current; }} && {{ [ -h staged ] || ln -s releases/slot-b staged; }} && {{ [ -h previous ] || ln -s releases/slot-c previous; }}"#
                );
                let output = self.remote.run(&dest_env.target, &command, timeout).await?;
                if !output.success() {
                    return Err(self.step_failed(
                        site,
                        def,
                        index,
                        step,
                        output.exit_code,
                        output.detail().to_string(),
                    ));
                }

                if self.registry.get(site, def.dest)?.is_none() {
                    self.registry
                        .put(&dest_env.clone().with_status(EnvStatus::Provisioning))?;
                }
                Ok(command)
            }

            StepKind::RegisterEnvironment => {
                let env = self
                    .registry
                    .get(site, def.dest)?
                    .unwrap_or_else(|| dest_env.clone())
                    .with_status(EnvStatus::Active);
                self.registry.put(&env)?;
                Ok(format!("tier {} registered active", def.dest))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_verify(
        &self,
        site: &SiteName,
        def: &TransitionDefinition,
        index: usize,
        step: &Step,
        verify: &Verify,
        ctx: &TemplateContext,
        source_env: Option<&Environment>,
        dest_env: &Environment,
    ) -> Result<(), TransitionError> {
        let target = self.role_target(verify.role, source_env, dest_env)?;
        let command = ctx.render(verify.template);
        let output = self
            .remote
            .run(&target, &command, self.config.policy.command_timeout)
            .await?;

        if !output.success() {
            return Err(TransitionError::VerificationFailed {
                transition: def.name.to_string(),
                index: index + 1,
                step: step.name.to_string(),
                site: site.clone(),
                tier: def.dest,
                detail: format!(
                    "'{command}' exited {}: {}",
                    output.exit_code,
                    output.detail()
                ),
                resume: format!("terrace run {site} {}", def.name),
            });
        }
        Ok(())
    }
}
