// ============================================
// Resource - Стримящийся ресурс блока
// ============================================
//
//   Unloaded --(Required)--> Loading --(publish)--> Loaded
//   Loaded --(NotRequired / stale)--> Unloaded
//
// Переходы происходят только внутри stream(). Начатая загрузка
// не отменяется: если результат уже не нужен, он публикуется и
// выгружается на следующем кадре.

use std::sync::Arc;

use crate::terrain::error::TerrainError;

use super::task::{TaskHandle, TaskManager, TaskPoll};
use super::{ResourceRequired, ResourceState};

/// Работа загрузки: выполняется в фоне или прямо в stream()
pub type LoadJob<T> = Box<dyn FnOnce() -> Result<T, TerrainError> + Send>;

/// Поведение конкретного вида ресурса
pub trait ResourcePolicy {
    type Object: Send + Sync + 'static;
    /// Параметры evaluate() (дистанции, маска текстур, номер LOD)
    type Params: ?Sized;
    /// Откуда грузить (блок, карта высот)
    type Source: ?Sized;

    /// Имя для логов
    fn name(&self) -> String;

    fn evaluate(&self, params: &Self::Params) -> ResourceRequired;

    fn load_job(&self, source: &Self::Source) -> LoadJob<Self::Object>;

    /// Загруженный объект больше не соответствует источнику
    fn is_stale(&self, _object: &Self::Object, _source: &Self::Source) -> bool {
        false
    }
}

pub struct Resource<P: ResourcePolicy> {
    policy: P,
    object: Option<Arc<P::Object>>,
    required: ResourceRequired,
    state: ResourceState,
    pending: Option<TaskHandle<Result<P::Object, TerrainError>>>,
}

impl<P: ResourcePolicy> Resource<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            object: None,
            required: ResourceRequired::No,
            state: ResourceState::Unloaded,
            pending: None,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Только запоминает флаг, ничего не грузит
    pub fn evaluate(&mut self, params: &P::Params) -> ResourceRequired {
        self.required = self.policy.evaluate(params);
        self.required
    }

    pub fn set_required(&mut self, required: ResourceRequired) {
        self.required = required;
    }

    #[inline]
    pub fn required(&self) -> ResourceRequired {
        self.required
    }

    #[inline]
    pub fn state(&self) -> ResourceState {
        self.state
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.state == ResourceState::Loaded
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.state == ResourceState::Loading
    }

    pub fn object(&self) -> Option<&Arc<P::Object>> {
        self.object.as_ref()
    }

    /// Один шаг стриминга
    pub fn stream(&mut self, tasks: &TaskManager, source: &P::Source) {
        if let Some(object) = &self.object {
            if self.policy.is_stale(object, source) {
                log::debug!("{}: loaded data is stale, dropping", self.policy.name());
                self.unload();
            }
        }

        match (self.required, self.state) {
            (ResourceRequired::Yes, ResourceState::Unloaded) => self.start_load(tasks, source),
            (ResourceRequired::No, ResourceState::Loaded) => {
                log::trace!("{}: not required, unloading", self.policy.name());
                self.unload();
            }
            _ => {}
        }

        if self.state == ResourceState::Loading {
            self.poll_pending();
        }
    }

    fn start_load(&mut self, tasks: &TaskManager, source: &P::Source) {
        let job = self.policy.load_job(source);
        if tasks.is_synchronous() {
            let result = job();
            self.publish(result);
        } else {
            log::trace!("{}: queued background load", self.policy.name());
            self.pending = Some(tasks.submit(job));
            self.state = ResourceState::Loading;
        }
    }

    fn poll_pending(&mut self) {
        let poll = match &self.pending {
            Some(handle) => handle.try_take(),
            None => TaskPoll::Lost,
        };
        match poll {
            TaskPoll::Pending => {}
            TaskPoll::Ready(result) => {
                self.pending = None;
                self.publish(result);
            }
            TaskPoll::Lost => {
                self.pending = None;
                self.publish(Err(TerrainError::TaskCancelled));
            }
        }
    }

    /// Дождаться фоновой загрузки и опубликовать её
    pub fn complete_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            let result = handle.wait().and_then(|r| r);
            self.publish(result);
        }
    }

    fn publish(&mut self, result: Result<P::Object, TerrainError>) {
        match result {
            Ok(object) => {
                log::debug!("{}: loaded", self.policy.name());
                self.object = Some(Arc::new(object));
                self.state = ResourceState::Loaded;
            }
            Err(e) => {
                log::warn!("{}: load failed: {}", self.policy.name(), e);
                self.object = None;
                self.state = ResourceState::Unloaded;
            }
        }
    }

    /// Выбросить загруженный объект. Фоновая загрузка продолжается.
    pub fn unload(&mut self) {
        self.object = None;
        if self.state == ResourceState::Loaded {
            self.state = ResourceState::Unloaded;
        }
    }

    /// Объект сразу, в обход стриминга (например, сгенерирован на месте)
    pub fn set_object(&mut self, object: P::Object) {
        self.object = Some(Arc::new(object));
        self.state = ResourceState::Loaded;
    }
}
