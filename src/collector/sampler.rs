//! Периодический замер одного скаляра в ограниченном окне.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::{Cancelled, Sample, Series};
use crate::device::Device;
use crate::snmp::{ObjectId, ProtoError, SnmpAdapter, Transport};

/// Минимально допустимый интервал между тиками.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Читает один OID одного устройства с фиксированным шагом до дедлайна.
///
/// Тики выровнены по `start + k * interval`, медленный запрос задерживает
/// только свой тик, пропущенные за это время границы отбрасываются. После
/// дедлайна новый тик не начинается, но запрос последнего тика может
/// завершиться позже.
pub struct BoundedSampler<T> {
    adapter: Arc<SnmpAdapter<T>>,
}

impl<T: Transport> BoundedSampler<T> {
    pub fn new(adapter: Arc<SnmpAdapter<T>>) -> Self {
        Self { adapter }
    }

    pub async fn sample(
        &self,
        device: &Device,
        oid: &ObjectId,
        duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Series, Cancelled> {
        let interval = if interval < MIN_INTERVAL {
            tracing::warn!(?interval, min_interval = ?MIN_INTERVAL, "sampling interval below minimum, clamping");
            MIN_INTERVAL
        } else {
            interval
        };

        tracing::info!(device = %device.name, %oid, ?duration, ?interval, "sampling started");

        let started_at = Utc::now();
        let start = Instant::now();
        // Длительность за пределами часов: замер заканчивается только по отмене.
        let deadline = start.checked_add(duration);
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut samples = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(device = %device.name, samples = samples.len(), "sampling cancelled");
                    return Err(Cancelled);
                }
                _ = until(deadline) => break,
                _ = ticker.tick() => {}
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let outcome = self.adapter.get(device, oid, cancel).await;
            let offset_seconds = start.elapsed().as_secs_f64();
            match outcome {
                Ok(value) => {
                    tracing::trace!(device = %device.name, offset_seconds, %value, "sample");
                    samples.push(Sample::ok(offset_seconds, value));
                }
                Err(ProtoError::Cancelled) => {
                    tracing::info!(device = %device.name, samples = samples.len(), "sampling cancelled");
                    return Err(Cancelled);
                }
                Err(e) => {
                    tracing::warn!(device = %device.name, offset_seconds, error = %e, "sample failed");
                    samples.push(Sample::failed(offset_seconds, e));
                }
            }
        }

        let series = Series::new(
            device.name.clone(),
            oid.clone(),
            started_at,
            duration,
            interval,
            samples,
        );
        tracing::info!(
            device = %device.name,
            samples = series.len(),
            failed = series.failures().count(),
            "sampling completed"
        );
        Ok(series)
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
