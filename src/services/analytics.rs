//! # Analytics Service
//!
//! Raw workflow metrics computed from the repository: case throughput,
//! completion velocity, stage bottlenecks, and per-stage progress. Case
//! metrics scan every task of a case, so results are held in a short-lived
//! TTL cache. Rendering and dashboards live elsewhere.

use crate::constants::{StageStatus, TaskStatus};
use crate::error::Result;
use crate::repository::{StageFilter, StageRepository, TaskFilter, TaskRepository};
use crate::store::TtlStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const METRICS_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetrics {
    pub case_id: String,
    pub total_tasks: usize,
    pub by_status: HashMap<String, usize>,
    /// Done tasks over all tasks, 0.0 to 100.0.
    pub completion_rate: f64,
    pub overdue_tasks: usize,
    /// Mean started-to-completed hours across completed tasks.
    pub avg_cycle_hours: Option<f64>,
    pub total_actual_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyVelocity {
    pub date: NaiveDate,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBottleneck {
    pub stage_id: String,
    pub stage_name: String,
    pub open_tasks: usize,
    /// Age in hours of the oldest open task, by started or due date.
    pub oldest_open_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage_id: String,
    pub name: String,
    pub status: StageStatus,
    pub progress: u8,
    pub total_tasks: usize,
    pub done_tasks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStatusSummary {
    pub case_id: String,
    pub stages: Vec<StageProgress>,
    /// Mean stage progress, 0.0 to 100.0.
    pub overall_progress: f64,
}

pub struct AnalyticsService {
    tasks: Arc<dyn TaskRepository>,
    stages: Arc<dyn StageRepository>,
    metrics_cache: Arc<TtlStore<String, CaseMetrics>>,
    cache_ttl: std::time::Duration,
}

impl AnalyticsService {
    pub fn new(tasks: Arc<dyn TaskRepository>, stages: Arc<dyn StageRepository>) -> Self {
        Self {
            tasks,
            stages,
            metrics_cache: Arc::new(TtlStore::new()),
            cache_ttl: METRICS_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Spawn the background eviction pass for the metrics cache. Abort the
    /// handle on shutdown.
    pub fn spawn_cache_evictor(
        &self,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        self.metrics_cache.spawn_evictor(interval)
    }

    /// Cached case entries, including not-yet-evicted expired ones.
    pub fn cached_metrics(&self) -> usize {
        self.metrics_cache.len()
    }

    pub async fn case_metrics(&self, case_id: &str) -> Result<CaseMetrics> {
        if let Some(cached) = self.metrics_cache.get(&case_id.to_string()) {
            return Ok(cached);
        }
        let now = Utc::now();
        let tasks = self.tasks.find_all(&TaskFilter::for_case(case_id)).await?;

        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut overdue = 0;
        let mut cycle_hours = Vec::new();
        let mut total_actual_hours = 0.0;
        for task in &tasks {
            *by_status.entry(task.status.to_string()).or_default() += 1;
            if task.is_overdue(now) {
                overdue += 1;
            }
            total_actual_hours += task.actual_hours;
            if let (Some(started), Some(completed)) = (task.started_date, task.completed_date) {
                cycle_hours.push((completed - started).num_seconds() as f64 / 3600.0);
            }
        }

        let done = by_status
            .get(&TaskStatus::Done.to_string())
            .copied()
            .unwrap_or(0);
        let completion_rate = if tasks.is_empty() {
            0.0
        } else {
            done as f64 / tasks.len() as f64 * 100.0
        };
        let avg_cycle_hours = if cycle_hours.is_empty() {
            None
        } else {
            Some(cycle_hours.iter().sum::<f64>() / cycle_hours.len() as f64)
        };

        let metrics = CaseMetrics {
            case_id: case_id.to_string(),
            total_tasks: tasks.len(),
            by_status,
            completion_rate,
            overdue_tasks: overdue,
            avg_cycle_hours,
            total_actual_hours,
        };
        self.metrics_cache
            .insert(case_id.to_string(), metrics.clone(), Some(self.cache_ttl));
        Ok(metrics)
    }

    /// Completed tasks per day over the trailing window, oldest day first.
    pub async fn velocity(&self, case_id: &str, days: u32) -> Result<Vec<DailyVelocity>> {
        let now = Utc::now();
        let window_start = now - Duration::days(i64::from(days));
        let tasks = self
            .tasks
            .find_all(&TaskFilter::for_case(case_id).with_status(TaskStatus::Done))
            .await?;

        let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
        for task in &tasks {
            if let Some(completed) = task.completed_date {
                if completed >= window_start {
                    *per_day.entry(completed.date_naive()).or_default() += 1;
                }
            }
        }

        let mut series: Vec<DailyVelocity> = (0..days)
            .map(|offset| {
                let date = (window_start + Duration::days(i64::from(offset) + 1)).date_naive();
                DailyVelocity {
                    date,
                    completed: per_day.get(&date).copied().unwrap_or(0),
                }
            })
            .collect();
        series.sort_by_key(|d| d.date);
        Ok(series)
    }

    /// Stages ranked by oldest open task age, worst first.
    pub async fn bottlenecks(&self, case_id: &str) -> Result<Vec<StageBottleneck>> {
        let now = Utc::now();
        let stages = self.stages.find_all(&StageFilter::for_case(case_id)).await?;
        let tasks = self.tasks.find_all(&TaskFilter::for_case(case_id)).await?;

        let mut bottlenecks = Vec::new();
        for stage in &stages {
            let open: Vec<_> = tasks
                .iter()
                .filter(|t| t.stage_id == stage.id && !t.status.is_terminal())
                .collect();
            if open.is_empty() {
                continue;
            }
            let oldest_open_hours = open
                .iter()
                .filter_map(|t| age_reference(t.started_date, t.due_date))
                .map(|at| (now - at).num_seconds() as f64 / 3600.0)
                .fold(0.0_f64, f64::max);
            bottlenecks.push(StageBottleneck {
                stage_id: stage.id.clone(),
                stage_name: stage.name.clone(),
                open_tasks: open.len(),
                oldest_open_hours,
            });
        }
        bottlenecks.sort_by(|a, b| {
            b.oldest_open_hours
                .partial_cmp(&a.oldest_open_hours)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(bottlenecks)
    }

    pub async fn case_status(&self, case_id: &str) -> Result<CaseStatusSummary> {
        let stages = self.stages.find_all(&StageFilter::for_case(case_id)).await?;
        let tasks = self.tasks.find_all(&TaskFilter::for_case(case_id)).await?;

        let mut progresses = Vec::new();
        for stage in &stages {
            let stage_tasks: Vec<_> = tasks.iter().filter(|t| t.stage_id == stage.id).collect();
            let done = stage_tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .count();
            progresses.push(StageProgress {
                stage_id: stage.id.clone(),
                name: stage.name.clone(),
                status: stage.status,
                progress: stage.progress,
                total_tasks: stage_tasks.len(),
                done_tasks: done,
            });
        }
        let overall_progress = if progresses.is_empty() {
            0.0
        } else {
            progresses.iter().map(|p| f64::from(p.progress)).sum::<f64>()
                / progresses.len() as f64
        };
        Ok(CaseStatusSummary {
            case_id: case_id.to_string(),
            stages: progresses,
            overall_progress,
        })
    }
}

fn age_reference(
    started: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    started.or(due)
}
