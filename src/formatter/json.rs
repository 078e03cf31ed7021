use serde::{Deserialize, Serialize};

use crate::collector::{DeviceInventory, FleetReport, InterfaceRecord, Series};

/// JSON-представление прохода по парку.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetReportJson {
    pub timestamp: String,
    pub summary: FleetSummary,
    pub devices: Vec<DeviceJson>,
    pub errors: Vec<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_devices: usize,
    pub resolved_devices: usize,
    pub failed_devices: usize,
    pub total_interfaces: usize,
    pub dropped_interfaces: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceJson {
    pub name: String,
    pub vendor: String,
    pub sys_object_id: Option<String>,
    pub interfaces: Vec<InterfaceJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceJson {
    pub index: u32,
    pub name: Option<String>,
    pub status: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

/// Один сбойный элемент. `item_type`: "device", "interface" или "sample".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub item_type: String,
    pub item_name: String,
    pub error_kind: String,
    pub error_message: String,
}

/// JSON-представление замера.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesJson {
    pub device: String,
    pub oid: String,
    pub started_at: String,
    pub duration_secs: f64,
    pub interval_secs: f64,
    pub summary: SeriesSummary,
    pub samples: Vec<SampleJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub total_samples: usize,
    pub successful_samples: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleJson {
    pub offset_seconds: f64,
    pub value: Option<String>,
    pub status: String, // "success" | "error" | "timeout"
    pub error: Option<String>,
}

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_fleet(report: &FleetReport) -> FleetReportJson {
        let timestamp = chrono::Utc::now().to_rfc3339();

        let devices: Vec<DeviceJson> = report
            .devices
            .iter()
            .map(|(name, device)| Self::format_device(name, device))
            .collect();

        let summary = FleetSummary {
            total_devices: report.devices.len() + report.failures.len(),
            resolved_devices: report.devices.len(),
            failed_devices: report.failures.len(),
            total_interfaces: devices.iter().map(|d| d.interfaces.len()).sum(),
            dropped_interfaces: report
                .devices
                .values()
                .map(|d| d.inventory.failures().count())
                .sum(),
        };

        FleetReportJson {
            timestamp,
            summary,
            devices,
            errors: Self::extract_errors(report),
        }
    }

    fn format_device(name: &str, device: &DeviceInventory) -> DeviceJson {
        DeviceJson {
            name: name.to_string(),
            vendor: device.vendor.to_string(),
            sys_object_id: device.sys_object_id.as_ref().map(|oid| oid.to_string()),
            interfaces: device
                .inventory
                .records
                .iter()
                .map(Self::format_interface)
                .collect(),
        }
    }

    fn format_interface(record: &InterfaceRecord) -> InterfaceJson {
        InterfaceJson {
            index: record.index,
            name: record.name.clone(),
            status: record.oper_status.to_string(),
            ipv4: record.ipv4.map(|a| a.to_string()),
            ipv6: record.ipv6.map(|a| a.to_string()),
        }
    }

    /// Сбойные устройства и интерфейсы, отброшенные из-за ошибки. Индексы,
    /// которых у агента нет, ошибками не считаются и не выводятся.
    fn extract_errors(report: &FleetReport) -> Vec<ErrorInfo> {
        let mut errors = Vec::new();

        for (name, failure) in &report.failures {
            errors.push(ErrorInfo {
                item_type: "device".to_string(),
                item_name: name.clone(),
                error_kind: "device".to_string(),
                error_message: failure.to_string(),
            });
        }

        for (name, device) in &report.devices {
            for dropped in device.inventory.failures() {
                errors.push(ErrorInfo {
                    item_type: "interface".to_string(),
                    item_name: format!("{name}#{}", dropped.index),
                    error_kind: dropped.attribute.to_string(),
                    error_message: dropped.error.to_string(),
                });
            }
        }

        errors
    }

    pub fn format_series(series: &Series) -> SeriesJson {
        let values: Vec<f64> = series.points().map(|(_, v)| v).collect();
        let (min, max, mean) = if values.is_empty() {
            (None, None, None)
        } else {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (Some(min), Some(max), Some(mean))
        };

        let samples = series
            .samples()
            .iter()
            .map(|s| {
                let status = match &s.error {
                    None => "success",
                    Some(e) if e.kind() == "timeout" => "timeout",
                    Some(_) => "error",
                };
                SampleJson {
                    offset_seconds: s.offset_seconds,
                    value: s.value.as_ref().map(|v| v.to_string()),
                    status: status.to_string(),
                    error: s.error.as_ref().map(|e| e.to_string()),
                }
            })
            .collect();

        SeriesJson {
            device: series.device().to_string(),
            oid: series.oid().to_string(),
            started_at: series.started_at().to_rfc3339(),
            duration_secs: series.duration().as_secs_f64(),
            interval_secs: series.interval().as_secs_f64(),
            summary: SeriesSummary {
                total_samples: series.len(),
                successful_samples: series.len() - series.failures().count(),
                min,
                max,
                mean,
            },
            samples,
        }
    }

    pub fn fleet_to_json_string(report: &FleetReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Self::format_fleet(report))
    }

    pub fn series_to_json_string(series: &Series) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Self::format_series(series))
    }
}
