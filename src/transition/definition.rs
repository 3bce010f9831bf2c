// ABOUTME: Data-driven transition registry: every edge of the tier graph as data.
// ABOUTME: Adding a transition means adding an entry here, not touching the executor.

use crate::types::Tier;
use nonempty::NonEmpty;

/// Which machine a step command runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    /// The source tier's target.
    Source,
    /// The destination tier's target.
    Dest,
    /// The control machine running terrace.
    Control,
}

/// Registry state a step requires before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    SourceActive,
    BothActive,
    DestNotActive,
}

/// One endpoint of a content sync: an alias under a tier's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEndpoint {
    pub role: TargetRole,
    pub alias: &'static str,
}

/// What a step does. Commands are shell templates; the other kinds are
/// engine operations that cannot be expressed as a single template.
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Run a rendered shell template on the given target.
    Command {
        role: TargetRole,
        template: &'static str,
    },
    /// Copy one alias's content over another's, same-host or cross-host.
    SyncContent { from: SyncEndpoint, to: SyncEndpoint },
    /// Allocate a server for the destination tier via the Provisioner.
    CreateServer,
    /// Poll the provisioned server until ready (bounded backoff).
    AwaitReady,
    /// Wait for the destination domain to resolve; expiry is non-fatal.
    ConfigureDns,
    /// Create the releases/slot-{a,b,c} layout and aliases, idempotently.
    InitSlots,
    /// Record the destination environment as active in the registry.
    RegisterEnvironment,
}

/// A verification command run after the step's own operation succeeded.
/// Failure here is reported as "ran but failed verification", distinct from
/// an execution failure.
#[derive(Debug, Clone, Copy)]
pub struct Verify {
    pub role: TargetRole,
    pub template: &'static str,
}

/// One independently tracked, assumed-idempotent unit of work.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: &'static str,
    pub kind: StepKind,
    pub precondition: Precondition,
    pub verify: Option<Verify>,
}

impl Step {
    fn new(name: &'static str, kind: StepKind) -> Self {
        Self {
            name,
            kind,
            precondition: Precondition::None,
            verify: None,
        }
    }

    fn pre(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    fn verify(mut self, role: TargetRole, template: &'static str) -> Self {
        self.verify = Some(Verify { role, template });
        self
    }
}

/// A named, ordered multi-step move between tiers.
#[derive(Debug, Clone)]
pub struct TransitionDefinition {
    pub name: &'static str,
    /// None for provisioning transitions, which create their destination.
    pub source: Option<Tier>,
    pub dest: Tier,
    pub steps: NonEmpty<Step>,
    /// Whether the transition ends in a blue-green swap on the destination.
    pub swap: bool,
}

/// Placeholder values substituted into step templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub site: String,
    pub source_root: String,
    pub source_domain: String,
    pub dest_root: String,
    pub dest_domain: String,
    pub marker: String,
}

impl TemplateContext {
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{site}", &self.site)
            .replace("{source_root}", &self.source_root)
            .replace("{source_domain}", &self.source_domain)
            .replace("{dest_root}", &self.dest_root)
            .replace("{dest_domain}", &self.dest_domain)
            .replace("{marker}", &self.marker)
    }
}

/// Stamp the destination domain and a fresh release marker into the staged
/// copy. The marker is what the swap health gate later checks.
const APPLY_CONFIG: &str = r#"printf '%s\n' "{dest_domain}" > "{dest_root}/staged/.domain" && date -u +%Y%m%dT%H%M%SZ > "{dest_root}/staged/{marker}""#;

/// Rewrite only the domain when syncing backwards; the synced content keeps
/// its original release marker. Reverse syncs refresh the working copy in
/// place, so this targets `current`, which on a hand-managed dev tier is a
/// plain directory rather than a slot alias.
const SCRUB_CONFIG: &str = r#"printf '%s\n' "{dest_domain}" > "{dest_root}/current/.domain""#;

const VERIFY_PUBLISHED: &str = r#"test -f "{dest_root}/current/{marker}""#;

const VERIFY_STAGED: &str = r#"test -f "{dest_root}/staged/{marker}""#;

fn promote(name: &'static str, source: Tier, dest: Tier) -> TransitionDefinition {
    TransitionDefinition {
        name,
        source: Some(source),
        dest,
        swap: false,
        steps: NonEmpty::from((
            Step::new("prepare-slots", StepKind::InitSlots).pre(Precondition::SourceActive),
            vec![
                Step::new(
                    "sync-content",
                    StepKind::SyncContent {
                        from: SyncEndpoint {
                            role: TargetRole::Source,
                            alias: "current",
                        },
                        to: SyncEndpoint {
                            role: TargetRole::Dest,
                            alias: "staged",
                        },
                    },
                ),
                Step::new(
                    "apply-config",
                    StepKind::Command {
                        role: TargetRole::Dest,
                        template: APPLY_CONFIG,
                    },
                ),
                Step::new(
                    "publish",
                    StepKind::SyncContent {
                        from: SyncEndpoint {
                            role: TargetRole::Dest,
                            alias: "staged",
                        },
                        to: SyncEndpoint {
                            role: TargetRole::Dest,
                            alias: "current",
                        },
                    },
                ),
                Step::new("activate", StepKind::RegisterEnvironment)
                    .verify(TargetRole::Dest, VERIFY_PUBLISHED),
            ],
        )),
    }
}

fn stage_and_swap(name: &'static str, source: Tier, dest: Tier) -> TransitionDefinition {
    TransitionDefinition {
        name,
        source: Some(source),
        dest,
        swap: true,
        steps: NonEmpty::from((
            Step::new("prepare-slots", StepKind::InitSlots).pre(Precondition::SourceActive),
            vec![
                Step::new(
                    "sync-content",
                    StepKind::SyncContent {
                        from: SyncEndpoint {
                            role: TargetRole::Source,
                            alias: "current",
                        },
                        to: SyncEndpoint {
                            role: TargetRole::Dest,
                            alias: "staged",
                        },
                    },
                ),
                Step::new(
                    "apply-config",
                    StepKind::Command {
                        role: TargetRole::Dest,
                        template: APPLY_CONFIG,
                    },
                ),
                Step::new(
                    "stage-verify",
                    StepKind::Command {
                        role: TargetRole::Dest,
                        template: VERIFY_STAGED,
                    },
                ),
                Step::new("activate", StepKind::RegisterEnvironment),
            ],
        )),
    }
}

fn sync_back(name: &'static str, source: Tier, dest: Tier) -> TransitionDefinition {
    TransitionDefinition {
        name,
        source: Some(source),
        dest,
        swap: false,
        steps: NonEmpty::from((
            Step::new(
                "sync-content",
                StepKind::SyncContent {
                    from: SyncEndpoint {
                        role: TargetRole::Source,
                        alias: "current",
                    },
                    to: SyncEndpoint {
                        role: TargetRole::Dest,
                        alias: "current",
                    },
                },
            )
            .pre(Precondition::BothActive),
            vec![Step::new(
                "scrub-config",
                StepKind::Command {
                    role: TargetRole::Dest,
                    template: SCRUB_CONFIG,
                },
            )],
        )),
    }
}

fn provision(name: &'static str, dest: Tier) -> TransitionDefinition {
    TransitionDefinition {
        name,
        source: None,
        dest,
        swap: false,
        steps: NonEmpty::from((
            Step::new("create-server", StepKind::CreateServer).pre(Precondition::DestNotActive),
            vec![
                Step::new("await-ready", StepKind::AwaitReady),
                Step::new("configure-dns", StepKind::ConfigureDns),
                Step::new("prepare-slots", StepKind::InitSlots),
                Step::new("activate", StepKind::RegisterEnvironment),
            ],
        )),
    }
}

/// Lookup table of every known transition.
#[derive(Debug)]
pub struct TransitionRegistry {
    transitions: Vec<TransitionDefinition>,
}

impl TransitionRegistry {
    pub fn builtin() -> Self {
        Self {
            transitions: vec![
                promote("dev2stg", Tier::Dev, Tier::Stg),
                promote("stg2live", Tier::Stg, Tier::Live),
                stage_and_swap("live2prod", Tier::Live, Tier::Prod),
                stage_and_swap("stg2prod", Tier::Stg, Tier::Prod),
                sync_back("prod2live", Tier::Prod, Tier::Live),
                sync_back("prod2stg", Tier::Prod, Tier::Stg),
                sync_back("live2stg", Tier::Live, Tier::Stg),
                sync_back("stg2dev", Tier::Stg, Tier::Dev),
                provision("provision_live", Tier::Live),
                provision("provision_prod", Tier::Prod),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&TransitionDefinition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    /// The transition that creates `tier` from nothing, if one exists.
    pub fn provisioning_for(&self, tier: Tier) -> Option<&TransitionDefinition> {
        self.transitions
            .iter()
            .find(|t| t.source.is_none() && t.dest == tier)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transitions.iter().map(|t| t.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_graph_edges() {
        let registry = TransitionRegistry::builtin();
        for name in [
            "dev2stg", "stg2live", "live2prod", "stg2prod", "prod2live", "prod2stg", "live2stg",
            "stg2dev",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn dev2stg_has_five_steps() {
        let registry = TransitionRegistry::builtin();
        let def = registry.get("dev2stg").unwrap();
        assert_eq!(def.steps.len(), 5);
        assert!(!def.swap);
    }

    #[test]
    fn prod_transitions_are_swap_bearing() {
        let registry = TransitionRegistry::builtin();
        assert!(registry.get("live2prod").unwrap().swap);
        assert!(registry.get("stg2prod").unwrap().swap);
        // The shortcut never touches live.
        assert_eq!(registry.get("stg2prod").unwrap().source, Some(Tier::Stg));
    }

    #[test]
    fn provisioning_transitions_have_no_source() {
        let registry = TransitionRegistry::builtin();
        let live = registry.provisioning_for(Tier::Live).unwrap();
        assert_eq!(live.name, "provision_live");
        assert!(live.source.is_none());
        assert!(registry.provisioning_for(Tier::Stg).is_none());
    }

    #[test]
    fn unknown_transition_is_none() {
        let registry = TransitionRegistry::builtin();
        assert!(registry.get("dev2prod").is_none());
    }

    #[test]
    fn template_rendering_substitutes_all_placeholders() {
        let ctx = TemplateContext {
            site: "s1".to_string(),
            source_root: "/src".to_string(),
            source_domain: "dev.s1.test".to_string(),
            dest_root: "/dst".to_string(),
            dest_domain: "stg.s1.test".to_string(),
            marker: ".release".to_string(),
        };

        let rendered = ctx.render(APPLY_CONFIG);
        assert!(rendered.contains("stg.s1.test"));
        assert!(rendered.contains("/dst/staged/.release"));
        assert!(!rendered.contains('{'));
    }
}
