use tokio_util::sync::CancellationToken;

use crate::device::Device;
use crate::snmp::device_profiles::SYS_OBJECT_ID;
use crate::snmp::{DeviceDetector, ProtoError, SnmpAdapter, SnmpValue, Transport, Vendor};

/// Что предварительная проверка узнала об устройстве.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub sys_object_id: Option<crate::snmp::ObjectId>,
    pub vendor: Vendor,
}

/// Предварительная проверка: читаем sysObjectID, чтобы убедиться, что агент отвечает, и определить производителя.
pub struct DeviceInfo;

impl DeviceInfo {
    /// Ошибка только при сбое транспорта или отмене. Агент, который отвечает, но
    /// не отдаёт sysObjectID, считается доступным и обычным (generic).
    pub async fn probe<T: Transport>(
        adapter: &SnmpAdapter<T>,
        device: &Device,
        cancel: &CancellationToken,
    ) -> Result<DeviceIdentity, ProtoError> {
        match adapter.get(device, &SYS_OBJECT_ID, cancel).await {
            Ok(SnmpValue::ObjectId(oid)) => {
                let vendor = DeviceDetector::detect(&oid);
                tracing::debug!(device = %device.name, sys_object_id = %oid, %vendor, "device detected");
                Ok(DeviceIdentity {
                    sys_object_id: Some(oid),
                    vendor,
                })
            }
            Ok(other) => {
                tracing::debug!(device = %device.name, value = %other, "sysObjectID is not an OID");
                Ok(DeviceIdentity {
                    sys_object_id: None,
                    vendor: Vendor::Generic,
                })
            }
            Err(e @ ProtoError::Protocol { .. }) => {
                tracing::debug!(device = %device.name, error = %e, "sysObjectID refused");
                Ok(DeviceIdentity {
                    sys_object_id: None,
                    vendor: Vendor::Generic,
                })
            }
            Err(e) => Err(e),
        }
    }
}
