use crate::composer::ManifestComposer;
use crate::lifecycle::{validate_transition, Transition};
use crate::report::{FanOutReport, ModeReport, NetworkReport, StatusReport};
use crate::CoreError;
use bentoctl_runtime::{
    clone_url, select_backend, select_source_control, ComposeCommand, ComposeInvocation,
    RuntimeBackend, SourceControl,
};
use bentoctl_schema::{
    BuildVariant, CatalogError, Config, Resolution, ServiceCatalog, ServiceDescriptor,
};
use bentoctl_store::{ServiceStateMap, StateStore};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Options shared by `run` and `restart`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Pull each service's image before starting it.
    pub pull: bool,
    /// Recreate containers even if their configuration is unchanged.
    pub force_recreate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Stop,
    Clean,
    Pull,
    Run,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Stop => "stop",
            Step::Clean => "clean",
            Step::Pull => "pull",
            Step::Run => "run",
        }
    }
}

/// The variant each targeted service runs as and, once validated, the image
/// reference it pulls.
#[derive(Debug, Default)]
struct Plan {
    variants: BTreeMap<String, BuildVariant>,
    images: BTreeMap<String, String>,
}

impl Plan {
    fn recorded(ids: &[String], states: &ServiceStateMap) -> Self {
        let variants = ids
            .iter()
            .map(|id| (id.clone(), states.get(id).map(|s| s.mode).unwrap_or_default()))
            .collect();
        Self {
            variants,
            images: BTreeMap::new(),
        }
    }

    fn uniform(ids: &[String], variant: BuildVariant) -> Self {
        Self {
            variants: ids.iter().map(|id| (id.clone(), variant)).collect(),
            images: BTreeMap::new(),
        }
    }

    fn variant(&self, id: &str) -> BuildVariant {
        self.variants.get(id).copied().unwrap_or_default()
    }
}

/// Orchestrates the services of one deployment.
///
/// Every operation resolves its target once, reads the reconciled state,
/// validates everything it can without side effects, and only then starts
/// calling the compose tool.
pub struct Engine {
    config: Config,
    catalog: ServiceCatalog,
    store: StateStore,
    composer: ManifestComposer,
    backend: Box<dyn RuntimeBackend>,
    git: Box<dyn SourceControl>,
}

impl Engine {
    /// Load the catalog named by `config` and select the configured runtime.
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let catalog = ServiceCatalog::load(&config.catalog_path, &config.features)?;
        info!(
            "loaded {} services from {}",
            catalog.ids().count(),
            config.catalog_path.display()
        );
        let backend = select_backend(&config.runtime_backend, &config.compose_command)?;
        let git = select_source_control(&config.runtime_backend);
        Ok(Self::with_parts(config, catalog, backend, git))
    }

    pub fn with_parts(
        config: Config,
        catalog: ServiceCatalog,
        backend: Box<dyn RuntimeBackend>,
        git: Box<dyn SourceControl>,
    ) -> Self {
        let store = StateStore::new(&config.state_path, &catalog);
        let composer = ManifestComposer::from_config(&config);
        debug!(
            "engine ready (runtime={}, source control={}, base mode={})",
            backend.name(),
            git.name(),
            config.base_mode
        );
        Self {
            config,
            catalog,
            store,
            composer,
            backend,
            git,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Resolve `target` against the catalog, then keep only services the
    /// enabled compose files define.
    pub fn resolve(&self, target: &str) -> Result<Resolution, CoreError> {
        let resolution = self.catalog.resolve(target)?;
        match self.backend.defined_services(&self.base_invocation())? {
            Some(defined) => Ok(resolution.restrict_to(&defined)?),
            None => Ok(resolution),
        }
    }

    /// Open the state store and return the reconciled service modes.
    pub fn state(&self) -> Result<ServiceStateMap, CoreError> {
        let (states, report) = self.store.open_with_report()?;
        if !report.is_noop() {
            debug!(
                "state reconciled: {} added, {} removed, {} migrated",
                report.added.len(),
                report.removed.len(),
                report.migrated
            );
        }
        Ok(states)
    }

    /// The compose invocation for the process's base mode.
    pub fn base_invocation(&self) -> ComposeInvocation {
        self.invocation(BuildVariant::Prebuilt)
    }

    fn invocation(&self, variant: BuildVariant) -> ComposeInvocation {
        self.composer
            .build(self.config.base_mode, variant == BuildVariant::Local)
    }

    fn descriptor(&self, id: &str) -> Result<&ServiceDescriptor, CoreError> {
        self.catalog.get(id).ok_or_else(|| {
            CatalogError::UnknownService {
                identifier: id.to_owned(),
                known: self.catalog.ids().collect::<Vec<_>>().join(", "),
            }
            .into()
        })
    }

    /// Resolve a target that must name exactly one service.
    fn single(&self, target: &str, operation: &str) -> Result<String, CoreError> {
        match self.resolve(target)? {
            Resolution::Single(id) => Ok(id),
            Resolution::All(_) => Err(CoreError::InvalidTarget {
                operation: operation.to_owned(),
                target: target.to_owned(),
                detail: "every enabled service".to_owned(),
            }),
            Resolution::Group { members, .. } => Err(CoreError::InvalidTarget {
                operation: operation.to_owned(),
                target: target.to_owned(),
                detail: format!("a group of {} services", members.len()),
            }),
        }
    }

    /// Resolve every image reference up front, so a missing variable or dev
    /// variant stops the operation before any process runs.
    fn with_images(&self, mut plan: Plan) -> Result<Plan, CoreError> {
        for (id, variant) in &plan.variants {
            let coordinates = self.catalog.image_coordinates(id, *variant)?;
            let image = coordinates.image_ref(self.config.env())?;
            plan.images.insert(id.clone(), image);
        }
        Ok(plan)
    }

    fn step(
        &self,
        step: Step,
        id: &str,
        plan: &Plan,
        opts: RunOptions,
    ) -> Result<(), CoreError> {
        let variant = plan.variant(id);
        let invocation = self.invocation(variant);
        let services = vec![id.to_owned()];
        debug!("{id}: {} ({variant})", step.name());
        match step {
            Step::Stop => self
                .backend
                .compose(&invocation, &ComposeCommand::Stop { services })?,
            Step::Clean => self
                .backend
                .compose(&invocation, &ComposeCommand::Remove { services })?,
            Step::Pull => {
                if let Some(image) = plan.images.get(id) {
                    self.backend.pull_image(image)?;
                }
                self.backend
                    .compose(&invocation, &ComposeCommand::Pull { services })?;
            }
            Step::Run => self.backend.compose(
                &invocation,
                &ComposeCommand::Up {
                    services,
                    force_recreate: opts.force_recreate,
                },
            )?,
        }
        Ok(())
    }

    /// Run `steps` in order for each service. A failing step skips the rest
    /// of that service's steps; fan-out moves on to the next service, a
    /// single target returns the error.
    fn sequence(
        &self,
        ids: &[String],
        fan_out: bool,
        steps: &[Step],
        plan: &Plan,
        opts: RunOptions,
        report: &mut FanOutReport,
    ) -> Result<(), CoreError> {
        'services: for id in ids {
            for &step in steps {
                if let Err(e) = self.step(step, id, plan, opts) {
                    if !fan_out {
                        return Err(e);
                    }
                    warn!("{id}: {} failed: {e}", step.name());
                    report.fail(id, step.name(), &e);
                    continue 'services;
                }
            }
            report.succeed(id);
        }
        Ok(())
    }

    /// Start services in their recorded variants. Prebuilt services go up in
    /// one batched call; local ones each get their own overlay invocation.
    fn start(
        &self,
        ids: &[String],
        fan_out: bool,
        plan: &Plan,
        opts: RunOptions,
        report: &mut FanOutReport,
    ) -> Result<(), CoreError> {
        let mut ready = Vec::with_capacity(ids.len());
        for id in ids {
            if opts.pull {
                if let Err(e) = self.step(Step::Pull, id, plan, opts) {
                    if !fan_out {
                        return Err(e);
                    }
                    warn!("{id}: pull failed: {e}");
                    report.fail(id, Step::Pull.name(), &e);
                    continue;
                }
            }
            ready.push(id.clone());
        }

        let (local, prebuilt): (Vec<String>, Vec<String>) = ready
            .into_iter()
            .partition(|id| plan.variant(id) == BuildVariant::Local);

        if !prebuilt.is_empty() {
            info!("starting {} prebuilt service(s)", prebuilt.len());
            let command = ComposeCommand::Up {
                services: prebuilt.clone(),
                force_recreate: opts.force_recreate,
            };
            match self
                .backend
                .compose(&self.invocation(BuildVariant::Prebuilt), &command)
            {
                Ok(()) => prebuilt.iter().for_each(|id| report.succeed(id)),
                Err(e) if fan_out => {
                    warn!("batched run failed: {e}");
                    for id in &prebuilt {
                        report.fail(id, Step::Run.name(), &e);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        for id in &local {
            info!("{id}: starting local build");
            match self.step(Step::Run, id, plan, opts) {
                Ok(()) => report.succeed(id),
                Err(e) if fan_out => {
                    warn!("{id}: run failed: {e}");
                    report.fail(id, Step::Run.name(), &e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// `stop all` is one `compose down`; anything narrower stops services
    /// one by one.
    fn stop_resolved(
        &self,
        resolution: &Resolution,
        plan: &Plan,
        report: &mut FanOutReport,
    ) -> Result<(), CoreError> {
        if resolution.is_all() {
            info!("stopping all services");
            self.backend
                .compose(&self.base_invocation(), &ComposeCommand::Down)?;
            for id in resolution.ids() {
                report.succeed(id);
            }
            return Ok(());
        }
        self.sequence(
            resolution.ids(),
            resolution.is_fan_out(),
            &[Step::Stop],
            plan,
            RunOptions::default(),
            report,
        )
    }

    pub fn run(&self, target: &str, opts: RunOptions) -> Result<FanOutReport, CoreError> {
        let resolution = self.resolve(target)?;
        let states = self.state()?;
        let plan = self.with_images(Plan::recorded(resolution.ids(), &states))?;

        info!("run '{target}' ({} service(s))", resolution.ids().len());
        let mut report = FanOutReport::new("run", target);
        self.start(
            resolution.ids(),
            resolution.is_fan_out(),
            &plan,
            opts,
            &mut report,
        )?;
        Ok(report)
    }

    pub fn stop(&self, target: &str) -> Result<FanOutReport, CoreError> {
        let resolution = self.resolve(target)?;
        let plan = if resolution.is_all() {
            Plan::default()
        } else {
            Plan::recorded(resolution.ids(), &self.state()?)
        };
        let mut report = FanOutReport::new("stop", target);
        self.stop_resolved(&resolution, &plan, &mut report)?;
        Ok(report)
    }

    /// Stop, then run whatever stopped cleanly.
    pub fn restart(&self, target: &str, opts: RunOptions) -> Result<FanOutReport, CoreError> {
        let resolution = self.resolve(target)?;
        let states = self.state()?;
        let plan = self.with_images(Plan::recorded(resolution.ids(), &states))?;

        let mut stopped = FanOutReport::new("stop", target);
        self.stop_resolved(&resolution, &plan, &mut stopped)?;

        let mut report = FanOutReport::new("restart", target);
        report.failed = stopped.failed;
        self.start(
            &stopped.succeeded,
            resolution.is_fan_out(),
            &plan,
            opts,
            &mut report,
        )?;
        Ok(report)
    }

    /// Stop and remove containers with their anonymous volumes.
    pub fn clean(&self, target: &str) -> Result<FanOutReport, CoreError> {
        let resolution = self.resolve(target)?;
        let plan = Plan::recorded(resolution.ids(), &self.state()?);
        let mut report = FanOutReport::new("clean", target);
        self.sequence(
            resolution.ids(),
            resolution.is_fan_out(),
            &[Step::Clean],
            &plan,
            RunOptions::default(),
            &mut report,
        )?;
        Ok(report)
    }

    /// Pull each service's image for its currently recorded variant.
    pub fn pull(&self, target: &str) -> Result<FanOutReport, CoreError> {
        let resolution = self.resolve(target)?;
        let states = self.state()?;
        let plan = self.with_images(Plan::recorded(resolution.ids(), &states))?;
        let mut report = FanOutReport::new("pull", target);
        self.sequence(
            resolution.ids(),
            resolution.is_fan_out(),
            &[Step::Pull],
            &plan,
            RunOptions::default(),
            &mut report,
        )?;
        Ok(report)
    }

    /// Switch one service to its local build: clone or refresh the checkout,
    /// record LOCAL, then clean, pull and run it with the local overlay.
    pub fn work_on(&self, target: &str) -> Result<FanOutReport, CoreError> {
        let transition = Transition::WorkOn;
        let id = self.single(target, transition.operation())?;
        let descriptor = self.descriptor(&id)?;
        let mut states = self.state()?;
        let from = states.get(&id).map(|s| s.mode).unwrap_or_default();
        validate_transition(descriptor, from, transition)?;

        let ids = vec![id.clone()];
        let plan = self.with_images(Plan::uniform(&ids, transition.target()))?;

        let checkout = self.config.repos_dir.join(&id);
        let repository = if checkout.exists() {
            None
        } else {
            Some(
                descriptor
                    .repository
                    .as_deref()
                    .ok_or_else(|| CoreError::NoRepository(id.clone()))?,
            )
        };
        self.prepare_checkout(&id, repository, &checkout)?;

        states.entry(id.clone()).or_default().mode = transition.target();
        self.store.write(&states)?;
        info!("{id}: mode {from} -> {}", transition.target());

        let mut report = FanOutReport::new(transition.operation(), target);
        self.sequence(
            &ids,
            false,
            &[Step::Clean, Step::Pull, Step::Run],
            &plan,
            RunOptions::default(),
            &mut report,
        )?;
        Ok(report)
    }

    fn prepare_checkout(
        &self,
        id: &str,
        repository: Option<&str>,
        checkout: &Path,
    ) -> Result<(), CoreError> {
        match repository {
            None => {
                info!("{id}: refreshing tags in {}", checkout.display());
                self.git.fetch_tags(checkout)?;
            }
            Some(repository) => {
                let url = clone_url(repository, self.config.git_clone_https);
                info!("{id}: cloning {url} into {}", checkout.display());
                std::fs::create_dir_all(&self.config.repos_dir)?;
                self.git.clone_repo(&url, checkout)?;
            }
        }
        Ok(())
    }

    /// Switch services back to their prebuilt images. State for every
    /// resolved service is written once, then each is cleaned, pulled and
    /// run.
    pub fn prebuilt(&self, target: &str) -> Result<FanOutReport, CoreError> {
        let transition = Transition::Promote;
        let resolution = self.resolve(target)?;
        let mut states = self.state()?;

        let mut changed = Vec::new();
        for id in resolution.ids() {
            let from = states.get(id).map(|s| s.mode).unwrap_or_default();
            if validate_transition(self.descriptor(id)?, from, transition)? {
                changed.push(id.clone());
            }
        }
        let plan = self.with_images(Plan::uniform(resolution.ids(), transition.target()))?;

        if changed.is_empty() {
            debug!("all targeted services already prebuilt");
        } else {
            for id in &changed {
                states.entry(id.clone()).or_default().mode = transition.target();
            }
            self.store.write(&states)?;
            info!("recorded prebuilt for {}", changed.join(", "));
        }

        let mut report = FanOutReport::new(transition.operation(), target);
        self.sequence(
            resolution.ids(),
            resolution.is_fan_out(),
            &[Step::Clean, Step::Pull, Step::Run],
            &plan,
            RunOptions::default(),
            &mut report,
        )?;
        Ok(report)
    }

    /// Recorded modes, read-only.
    /// Reads only the catalog and the state file; no compose tool needed.
    pub fn mode(&self, target: &str) -> Result<Vec<ModeReport>, CoreError> {
        let resolution = self.catalog.resolve(target)?;
        let states = self.state()?;
        let reports: Vec<ModeReport> = resolution
            .ids()
            .iter()
            .map(|id| {
                let mode = states.get(id).map(|s| s.mode).unwrap_or_default();
                ModeReport::new(id, mode, self.config.base_mode)
            })
            .collect();
        for mixed in reports.iter().filter(|r| r.mixed) {
            warn!("{} runs a local build in a prod deployment", mixed.service);
        }
        Ok(reports)
    }

    /// Live container status, read-only. Over a fan-out target a failed
    /// inspection becomes an error row and the remaining services are
    /// still inspected.
    pub fn status(&self, target: &str) -> Result<Vec<StatusReport>, CoreError> {
        let resolution = self.resolve(target)?;
        let states = self.state()?;
        let mut reports = Vec::with_capacity(resolution.ids().len());
        for id in resolution.ids() {
            let descriptor = self.descriptor(id)?;
            let (status, error) = match self.backend.container_status(&descriptor.container_name)
            {
                Ok(status) => (Some(status), None),
                Err(e) if resolution.is_fan_out() => {
                    warn!("{id}: inspect failed: {e}");
                    (None, Some(e.to_string()))
                }
                Err(e) => return Err(e.into()),
            };
            reports.push(StatusReport {
                service: id.clone(),
                container: descriptor.container_name.clone(),
                mode: states.get(id).map(|s| s.mode).unwrap_or_default(),
                status,
                error,
            });
        }
        Ok(reports)
    }

    /// Open `shell` inside the running container. Returns the shell's exit
    /// code.
    pub fn shell(&self, target: &str, shell: &str) -> Result<i32, CoreError> {
        self.interactive(target, "shell", |service| ComposeCommand::Exec {
            service,
            command: vec![shell.to_owned()],
        })
    }

    /// Start a one-off container for the service with `shell` as its
    /// command.
    pub fn run_as_shell(&self, target: &str, shell: &str) -> Result<i32, CoreError> {
        self.interactive(target, "run-as-shell", |service| ComposeCommand::Run {
            service,
            command: vec![shell.to_owned()],
        })
    }

    fn interactive(
        &self,
        target: &str,
        operation: &str,
        command: impl FnOnce(String) -> ComposeCommand,
    ) -> Result<i32, CoreError> {
        let id = self.single(target, operation)?;
        let states = self.state()?;
        let variant = states.get(&id).map(|s| s.mode).unwrap_or_default();
        let invocation = self.invocation(variant);
        Ok(self
            .backend
            .compose_interactive(&invocation, &command(id))?)
    }

    /// Show container logs; no target (or `all`) shows every service.
    pub fn logs(&self, target: Option<&str>, follow: bool) -> Result<(), CoreError> {
        let services = match target {
            None => Vec::new(),
            Some(t) => {
                let resolution = self.resolve(t)?;
                if resolution.is_all() {
                    Vec::new()
                } else {
                    resolution.ids().to_vec()
                }
            }
        };
        self.backend.compose(
            &self.base_invocation(),
            &ComposeCommand::Logs { services, follow },
        )?;
        Ok(())
    }

    /// The merged compose configuration, or only its service names.
    pub fn compose_config(&self, services_only: bool) -> Result<String, CoreError> {
        Ok(self.backend.compose_output(
            &self.base_invocation(),
            &ComposeCommand::Config { services_only },
        )?)
    }

    /// Make sure every configured container network exists.
    pub fn init_networks(&self) -> Result<Vec<NetworkReport>, CoreError> {
        self.config
            .networks
            .iter()
            .map(|network| -> Result<NetworkReport, CoreError> {
                let outcome = self.backend.ensure_network(network)?;
                info!("network {network}: {outcome:?}");
                Ok(NetworkReport {
                    network: network.clone(),
                    outcome,
                })
            })
            .collect()
    }
}
