//! Vat creation.
//!
//! `create_vat_dynamically` and the `recreate_*` entry points validate
//! synchronously and queue a [`BuildTask`]; nothing reaches the manager factory
//! until the host drives the queue with [`VatLoader::run_builds`]. The host
//! does so between cranks, which is what keeps a `newVatCallback` from being
//! queued in the middle of another vat's crank. `run_builds` refuses to run
//! while a crank is open.

mod task;
mod termination;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::admin::AdminNotifier;
use crate::config::LoaderConfig;
use crate::error::KernelError;
use crate::keeper::KernelKeeper;
use crate::manager::{ManagerOptions, ManagerRegistry, VatManagerFactory, VatSetupFn};
use crate::options::{ManagerType, VatOptions};
use crate::queue::KernelQueue;
use crate::slog::{KernelSlog, VatConsole};
use crate::source::{VatSource, insist_bundle_shape};
use crate::vat::{VatId, VatKind};

pub use task::{BuildHandle, BuildOutcome, BuildState};
pub use termination::TerminationNotifier;

use task::BuildTask;

/// The kernel services vat creation depends on.
#[derive(Clone)]
pub struct LoaderContext {
    pub keeper: Arc<dyn KernelKeeper>,
    pub queue: Arc<dyn KernelQueue>,
    pub managers: Arc<dyn ManagerRegistry>,
    pub factory: Arc<dyn VatManagerFactory>,
    pub slog: Arc<dyn KernelSlog>,
}

pub struct VatLoader {
    ctx: LoaderContext,
    config: LoaderConfig,
    admin: AdminNotifier,
    builds: VecDeque<BuildTask>,
    states: BTreeMap<VatId, BuildState>,
    in_crank: bool,
    panic: Option<KernelError>,
}

impl VatLoader {
    pub fn new(ctx: LoaderContext, config: LoaderConfig) -> Self {
        let admin = AdminNotifier::new(
            ctx.keeper.clone(),
            ctx.queue.clone(),
            config.admin_vat_name.clone(),
        );
        Self {
            ctx,
            config,
            admin,
            builds: VecDeque::new(),
            states: BTreeMap::new(),
            in_crank: false,
            panic: None,
        }
    }

    pub fn admin(&self) -> &AdminNotifier {
        &self.admin
    }

    /// Creates a vat at runtime on behalf of the admin vat. Returns the new
    /// vat's id at once; the admin vat learns the outcome through
    /// `newVatCallback`.
    pub fn create_vat_dynamically(
        &mut self,
        source: VatSource,
        options: VatOptions,
    ) -> Result<VatId, KernelError> {
        let vat_id = self.ctx.keeper.allocate_unused_vat_id()?;
        let (task, _) = self.prepare(&vat_id, &source, &options, VatKind::Dynamic, true)?;
        if let Err(err) = self.persist(&vat_id, &source, &options) {
            self.states.remove(&vat_id);
            return Err(err);
        }
        self.enqueue(task);
        Ok(vat_id)
    }

    fn persist(
        &self,
        vat_id: &VatId,
        source: &VatSource,
        options: &VatOptions,
    ) -> Result<(), KernelError> {
        self.ctx.keeper.add_dynamic_vat_id(vat_id)?;
        self.ctx
            .keeper
            .set_source_and_options(vat_id, source, options)
    }

    /// Restores a dynamic vat at startup. Its original requester is gone, so
    /// success is not reported and failure is fatal.
    pub fn recreate_dynamic_vat(
        &mut self,
        vat_id: VatId,
        source: &VatSource,
        options: &VatOptions,
    ) -> Result<VatId, KernelError> {
        let (task, _) = self.prepare(&vat_id, source, options, VatKind::Dynamic, false)?;
        self.enqueue(task);
        Ok(vat_id)
    }

    /// Restores a static vat at startup. The handle resolves once the vat is
    /// ready for messages.
    pub fn recreate_static_vat(
        &mut self,
        vat_id: VatId,
        source: &VatSource,
        options: &VatOptions,
    ) -> Result<BuildHandle, KernelError> {
        let (task, handle) = self.prepare(&vat_id, source, options, VatKind::Static, false)?;
        self.enqueue(task);
        Ok(handle)
    }

    /// Restores every dynamic vat the keeper knows about, in creation order.
    pub fn recreate_dynamic_vats(&mut self) -> Result<Vec<VatId>, KernelError> {
        let keeper = self.ctx.keeper.clone();
        keeper
            .dynamic_vat_ids()
            .into_iter()
            .map(|vat_id| {
                let (source, options) = keeper.source_and_options(&vat_id).ok_or_else(|| {
                    KernelError::Keeper(format!("no source recorded for dynamic vat {vat_id}"))
                })?;
                self.recreate_dynamic_vat(vat_id, &source, &options)
            })
            .collect()
    }

    /// Starts a vat from a setup function instead of a bundle. For test
    /// harnesses only; skips validation and notification.
    pub async fn load_test_vat(
        &self,
        vat_id: &VatId,
        setup: VatSetupFn,
        options: ManagerOptions,
    ) -> Result<(), KernelError> {
        let options = ManagerOptions {
            setup: Some(setup),
            enable_setup: true,
            manager_type: Some(ManagerType::Local),
            ..options
        };
        let manager = self
            .ctx
            .factory
            .create(vat_id, options.clone())
            .await
            .map_err(|err| KernelError::VatBuildFailed {
                vat_id: vat_id.clone(),
                reason: format!("{err:#}"),
            })?;
        self.ctx.managers.add_vat_manager(vat_id, manager, &options)
    }

    pub fn begin_crank(&mut self) {
        self.in_crank = true;
    }

    pub fn end_crank(&mut self) {
        self.in_crank = false;
    }

    pub fn pending_builds(&self) -> usize {
        self.builds.len()
    }

    /// State of the vat's latest build. Finished builds are forgotten at the
    /// start of the next `run_builds`.
    pub fn build_state(&self, vat_id: &VatId) -> Option<BuildState> {
        self.states.get(vat_id).copied()
    }

    /// The fatal error that stopped the loader, if any. The host is expected
    /// to flush diagnostics and abort.
    pub fn panic(&self) -> Option<&KernelError> {
        self.panic.as_ref()
    }

    /// Drives queued builds to completion in the order they were created and
    /// returns how many finished. Stops with an error at the first startup
    /// build that fails.
    pub async fn run_builds(&mut self) -> Result<usize, KernelError> {
        if let Some(err) = &self.panic {
            return Err(err.clone());
        }
        if self.in_crank {
            return Err(KernelError::CrankInProgress);
        }
        self.states
            .retain(|_, state| !matches!(state, BuildState::Done(_)));
        let mut finished = 0;
        while let Some(task) = self.builds.pop_front() {
            self.drive(task).await?;
            finished += 1;
        }
        Ok(finished)
    }

    fn prepare(
        &mut self,
        vat_id: &VatId,
        source: &VatSource,
        options: &VatOptions,
        kind: VatKind,
        notify: bool,
    ) -> Result<(BuildTask, BuildHandle), KernelError> {
        self.states.insert(vat_id.clone(), BuildState::Validating);
        let prepared = self.validate(vat_id, source, options, kind, notify);
        if prepared.is_err() {
            self.states.remove(vat_id);
        }
        prepared
    }

    fn validate(
        &self,
        vat_id: &VatId,
        source: &VatSource,
        options: &VatOptions,
        kind: VatKind,
        notify: bool,
    ) -> Result<(BuildTask, BuildHandle), KernelError> {
        let bundle = source.resolve_bundle(vat_id, self.ctx.keeper.as_ref())?;
        let resolved = options.resolve(kind)?;
        insist_bundle_shape(vat_id, &bundle)?;

        let description = source.describe(&resolved.description);
        let notifier = TerminationNotifier::new(
            vat_id.clone(),
            self.admin.clone(),
            self.ctx.slog.clone(),
        );
        let manager_options = ManagerOptions {
            manager_type: resolved.manager_type.or(self.config.default_manager_type),
            bundle: Some(bundle.clone()),
            metered: resolved.metered,
            enable_disavow: resolved.enable_disavow,
            enable_setup: resolved.enable_setup,
            enable_pipelining: resolved.enable_pipelining,
            enable_internal_metering: !kind.is_dynamic()
                && self.config.internal_metering_for_static,
            notify_termination: Some(Arc::new(notifier)),
            vat_console: Some(VatConsole::new("vat", vat_id)),
            liveslots_console: Some(VatConsole::new("ls", vat_id)),
            vat_parameters: resolved.vat_parameters,
            virtual_object_cache_size: resolved.virtual_object_cache_size,
            setup: None,
        };
        Ok(BuildTask::new(
            vat_id.clone(),
            kind,
            notify,
            description,
            resolved.name,
            bundle,
            manager_options,
        ))
    }

    fn enqueue(&mut self, task: BuildTask) {
        self.states.insert(task.vat_id.clone(), BuildState::Queued);
        self.builds.push_back(task);
    }

    fn set_state(&mut self, vat_id: &VatId, state: BuildState) {
        log::trace!("vat {vat_id} build -> {state:?}");
        self.states.insert(vat_id.clone(), state);
    }

    async fn drive(&mut self, mut task: BuildTask) -> Result<(), KernelError> {
        let vat_id = task.vat_id.clone();
        self.set_state(&vat_id, BuildState::Building);
        self.ctx.slog.add_vat(
            &vat_id,
            task.kind,
            &task.description,
            task.name.as_deref(),
            &task.bundle,
        );

        let span = self.ctx.slog.startup(&vat_id);
        let built = self.ctx.factory.create(&vat_id, task.options.clone()).await;
        span.finish();
        let registered = match built {
            Ok(manager) => self
                .ctx
                .managers
                .add_vat_manager(&vat_id, manager, &task.options)
                .map_err(|err| err.to_string()),
            Err(err) => Err(format!("{err:#}")),
        };

        match registered {
            Ok(()) => {
                log::debug!("vat {vat_id} built ({})", task.description);
                if task.notify {
                    self.set_state(&vat_id, BuildState::Notifying);
                    match self.admin.success_response(&vat_id) {
                        Ok(args) => self.admin.new_vat_callback(args),
                        Err(err) => log::error!("error in vat creation for {vat_id}: {err}"),
                    }
                }
                self.set_state(&vat_id, BuildState::Done(BuildOutcome::Succeeded));
                task.complete(Ok(()));
                Ok(())
            }
            Err(reason) if task.notify => {
                log::warn!("build of vat {vat_id} failed: {reason}");
                self.set_state(&vat_id, BuildState::Notifying);
                self.admin
                    .new_vat_callback(self.admin.error_response(&vat_id, &reason));
                self.set_state(&vat_id, BuildState::Done(BuildOutcome::Failed));
                task.complete(Err(KernelError::VatBuildFailed { vat_id, reason }));
                Ok(())
            }
            Err(reason) => {
                // Nobody is left to tell, so the kernel cannot continue.
                log::error!("unable to re-create vat {vat_id}: {reason}");
                self.set_state(&vat_id, BuildState::Done(BuildOutcome::Failed));
                let err = KernelError::VatRecreateFailed { vat_id, reason };
                self.panic = Some(err.clone());
                task.complete(Err(err.clone()));
                Err(err)
            }
        }
    }
}
