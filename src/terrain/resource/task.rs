// ============================================
// Task Manager - Фоновые задачи загрузки
// ============================================
//
// Тяжёлая часть (чтение, распаковка, сборка) идёт в пуле rayon,
// результат возвращается по каналу и публикуется главным потоком.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;

use crate::terrain::error::TerrainError;
use crate::terrain::settings::{StreamMode, TerrainSettings};

/// Состояние фоновой задачи при опросе
#[derive(Debug)]
pub enum TaskPoll<T> {
    Pending,
    Ready(T),
    /// Задача завершилась без результата (паника в пуле)
    Lost,
}

/// Ожидание результата одной задачи
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Неблокирующий опрос
    pub fn try_take(&self) -> TaskPoll<T> {
        match self.rx.try_recv() {
            Ok(value) => TaskPoll::Ready(value),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }

    /// Дождаться результата
    pub fn wait(&self) -> Result<T, TerrainError> {
        self.rx.recv().map_err(|_| TerrainError::TaskCancelled)
    }
}

pub struct TaskManager {
    mode: StreamMode,
    pool: Option<rayon::ThreadPool>,
    in_flight: Arc<AtomicUsize>,
}

impl TaskManager {
    pub fn new(mode: StreamMode, worker_threads: usize) -> Result<Self, TerrainError> {
        let pool = match mode {
            StreamMode::Synchronous => None,
            StreamMode::Asynchronous => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(worker_threads.max(1))
                    .thread_name(|i| format!("terrain-stream-{}", i))
                    .panic_handler(|_| log::error!("terrain background task panicked"))
                    .build()
                    .map_err(|e| TerrainError::Config(format!("can't start task pool: {}", e)))?,
            ),
        };
        Ok(Self {
            mode,
            pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn from_settings(settings: &TerrainSettings) -> Result<Self, TerrainError> {
        Self::new(settings.stream_mode, settings.worker_threads)
    }

    /// Всё выполняется в вызывающем потоке
    pub fn synchronous() -> Self {
        Self {
            mode: StreamMode::Synchronous,
            pool: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    #[inline]
    pub fn is_synchronous(&self) -> bool {
        self.pool.is_none()
    }

    /// Сколько задач ещё не вернули результат
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Запустить задачу. В синхронном режиме результат готов сразу.
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = channel();
        match &self.pool {
            Some(pool) => {
                let counter = self.in_flight.clone();
                counter.fetch_add(1, Ordering::AcqRel);
                pool.spawn(move || {
                    let _in_flight = InFlight(counter);
                    let _ = tx.send(job());
                });
            }
            None => {
                let _ = tx.send(job());
            }
        }
        TaskHandle { rx }
    }
}

/// Снимает задачу со счётчика даже при панике
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronous_submit_is_ready() {
        let tasks = TaskManager::synchronous();
        let handle = tasks.submit(|| 21 * 2);
        assert!(matches!(handle.try_take(), TaskPoll::Ready(42)));
        assert!(matches!(handle.try_take(), TaskPoll::Lost));
    }

    #[test]
    fn test_pool_submit_and_wait() {
        let tasks = TaskManager::new(StreamMode::Asynchronous, 2).unwrap();
        let handles: Vec<_> = (0..8).map(|i| tasks.submit(move || i * i)).collect();
        let results: Vec<i32> = handles.iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36, 49]);
    }

    #[test]
    fn test_panicking_task_is_lost() {
        let tasks = TaskManager::new(StreamMode::Asynchronous, 1).unwrap();
        let handle = tasks.submit(|| -> u32 { panic!("boom") });
        assert!(matches!(handle.wait(), Err(TerrainError::TaskCancelled)));
    }
}
